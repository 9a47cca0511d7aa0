//! Module for deriving the kinetic equations of a reaction network and
//! integrating them to the equilibrium state

pub mod kinetics;
pub mod ode;
pub mod rate_law;
pub mod solver;
pub mod stoichiometry;
