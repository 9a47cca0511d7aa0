//! Module providing the structs for representing a chemical reaction network

pub mod element;
pub mod model;
pub mod reaction;
pub mod species_index;
