//! Module for reading and writing Models

pub mod json;

use thiserror::Error;

use crate::reaction_network::model::ModelError;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("could not read model file: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse model file: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}
