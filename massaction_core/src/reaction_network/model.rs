//! This module provides the Model struct for representing an entire reaction network

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use thiserror::Error;

use crate::configuration::CONFIGURATION;
use crate::reaction_network::reaction::Reaction;

/// A provider of validated reactions and simulation settings
///
/// Anything that can hand over a reaction list (a JSON file, a GUI form, a
/// mock in a test) implements this contract; a [`Model`] is then built from it
/// with [`Model::from_source`].
pub trait ReactionSource {
    /// The ordered reaction list
    fn reactions(&self) -> Result<Vec<Reaction>, ModelError>;
    /// Initial concentrations, if the source specifies any
    fn initial_conditions(&self) -> Option<IndexMap<String, f64>>;
    /// Simulation horizon in seconds, if the source specifies one
    fn simulation_time(&self) -> Option<f64>;
}

/// Represents a chemical reaction network together with its initial
/// concentrations and simulation horizon
///
/// The reaction list is fixed at construction; initial conditions and the
/// simulation time may be reset later, and both setters validate before
/// committing so a failed call leaves the model unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Ordered reaction list; the order is the canonical contract for
    /// interpreting externally supplied rate-constant vectors
    reactions: Vec<Reaction>,
    /// Union of all species symbols over all reactions
    all_species: BTreeSet<String>,
    /// Initial concentration per species; species not listed start at zero
    initial_conditions: IndexMap<String, f64>,
    /// Simulation horizon in seconds
    simulation_time: f64,
}

impl Model {
    /// Create a model from an ordered reaction list
    ///
    /// # Parameters
    /// - `reactions`: the reaction list, must be non-empty
    /// - `initial_conditions`: starting concentration per species; `None` (or
    ///   omitted species) means starting at zero
    /// - `simulation_time`: horizon in seconds; `None` falls back to the
    ///   configured default (30 s)
    pub fn new(
        reactions: Vec<Reaction>,
        initial_conditions: Option<IndexMap<String, f64>>,
        simulation_time: Option<f64>,
    ) -> Result<Model, ModelError> {
        if reactions.is_empty() {
            return Err(ModelError::EmptyReactionList);
        }
        let all_species: BTreeSet<String> = reactions
            .iter()
            .flat_map(|rx| rx.all_species())
            .map(|s| s.to_string())
            .collect();
        let initial_conditions = initial_conditions.unwrap_or_default();
        Self::check_initial_conditions(&all_species, &initial_conditions)?;
        let simulation_time = match simulation_time {
            Some(t) => t,
            None => {
                CONFIGURATION
                    .read()
                    .expect("configuration lock poisoned")
                    .default_simulation_time
            }
        };
        if !simulation_time.is_finite() || simulation_time <= 0.0 {
            return Err(ModelError::InvalidSimulationTime(simulation_time));
        }
        Ok(Model {
            reactions,
            all_species,
            initial_conditions,
            simulation_time,
        })
    }

    /// Build a model by querying a [`ReactionSource`]
    pub fn from_source(source: &impl ReactionSource) -> Result<Model, ModelError> {
        Model::new(
            source.reactions()?,
            source.initial_conditions(),
            source.simulation_time(),
        )
    }

    fn check_initial_conditions(
        all_species: &BTreeSet<String>,
        initial_conditions: &IndexMap<String, f64>,
    ) -> Result<(), ModelError> {
        for (symbol, &value) in initial_conditions {
            if !all_species.contains(symbol) {
                return Err(ModelError::UnknownSpecies {
                    symbol: symbol.clone(),
                });
            }
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidInitialCondition {
                    symbol: symbol.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Reset the initial conditions, validating before committing
    ///
    /// Species omitted from the map start at zero. A map in which every
    /// species is zero is accepted; the resulting trajectory is identically
    /// zero.
    pub fn set_initial_conditions(
        &mut self,
        initial_conditions: IndexMap<String, f64>,
    ) -> Result<(), ModelError> {
        Self::check_initial_conditions(&self.all_species, &initial_conditions)?;
        self.initial_conditions = initial_conditions;
        Ok(())
    }

    /// Reset the simulation horizon, validating before committing
    pub fn set_simulation_time(&mut self, simulation_time: f64) -> Result<(), ModelError> {
        if !simulation_time.is_finite() || simulation_time <= 0.0 {
            return Err(ModelError::InvalidSimulationTime(simulation_time));
        }
        self.simulation_time = simulation_time;
        Ok(())
    }

    /// The ordered reaction list
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// All species symbols appearing in the reaction list
    pub fn all_species(&self) -> &BTreeSet<String> {
        &self.all_species
    }

    /// The explicitly set initial concentrations (omitted species are zero)
    pub fn initial_conditions(&self) -> &IndexMap<String, f64> {
        &self.initial_conditions
    }

    /// The simulation horizon in seconds
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for rx in &self.reactions {
            writeln!(f, "{rx}")?;
        }
        write!(f, "Initial conditions: {:?}", self.initial_conditions)?;
        write!(f, "\n{}", self.simulation_time)
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("a model requires at least one reaction")]
    EmptyReactionList,
    #[error("initial condition given for `{symbol}`, which appears in no reaction")]
    UnknownSpecies { symbol: String },
    #[error("initial concentration of `{symbol}` must be finite and non-negative (got {value})")]
    InvalidInitialCondition { symbol: String, value: f64 },
    #[error("simulation time must be finite and positive (got {0})")]
    InvalidSimulationTime(f64),
    #[error("reaction {index} is malformed: {message}")]
    InvalidReaction { index: usize, message: String },
}
