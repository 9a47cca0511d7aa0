//! Core rust implementation of massaction, a crate for simulating chemical reaction
//! networks governed by mass-action kinetics and solving for their equilibrium state.

pub mod configuration;
pub mod io;
pub mod reaction_network;
pub mod simulate;
