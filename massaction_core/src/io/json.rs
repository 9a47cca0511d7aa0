//! Module providing JSON IO for massaction Models

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::IoError;
use crate::reaction_network::element::ReactionElement;
use crate::reaction_network::model::{Model, ModelError, ReactionSource};
use crate::reaction_network::reaction::{Reaction, ReactionBuilder};

// region JSON Model
/// Represents a JSON serialized reaction network, used for reading and
/// writing models in json format
///
/// The reactions are stored already structured (element lists plus rate
/// constants); parsing textual reaction syntax is an upstream concern and is
/// not handled here.
#[derive(Serialize, Deserialize)]
pub struct JsonModel {
    reactions: Vec<JsonReaction>,
    initial_conditions: Option<IndexMap<String, f64>>,
    simulation_time: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct JsonReaction {
    reactants: Vec<JsonElement>,
    products: Vec<JsonElement>,
    fwd_k: f64,
    #[serde(default)]
    rev_k: f64,
    #[serde(default)]
    bidirectional: bool,
}

#[derive(Serialize, Deserialize)]
struct JsonElement {
    symbol: String,
    coefficient: u32,
}

impl JsonModel {
    /// Read a json file into a JsonModel
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<JsonModel, IoError> {
        let json_data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json_data)?)
    }

    /// Write this JsonModel to a json file
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let json_data = serde_json::to_string_pretty(self)?;
        fs::write(path, json_data)?;
        Ok(())
    }
}
// endregion JSON Model

// region Conversions
impl From<&Model> for JsonModel {
    fn from(model: &Model) -> Self {
        let reactions = model
            .reactions()
            .iter()
            .map(|rx| JsonReaction {
                reactants: rx.reactants().iter().map(JsonElement::from).collect(),
                products: rx.products().iter().map(JsonElement::from).collect(),
                fwd_k: rx.fwd_k(),
                rev_k: rx.rev_k(),
                bidirectional: rx.is_bidirectional(),
            })
            .collect();
        JsonModel {
            reactions,
            initial_conditions: Some(model.initial_conditions().clone()),
            simulation_time: Some(model.simulation_time()),
        }
    }
}

impl From<&ReactionElement> for JsonElement {
    fn from(element: &ReactionElement) -> Self {
        JsonElement {
            symbol: element.symbol().to_string(),
            coefficient: element.coefficient(),
        }
    }
}

fn convert_elements(
    elements: &[JsonElement],
    reaction_index: usize,
) -> Result<Vec<ReactionElement>, ModelError> {
    elements
        .iter()
        .map(|e| {
            ReactionElement::new(&e.symbol, e.coefficient).map_err(|err| {
                ModelError::InvalidReaction {
                    index: reaction_index,
                    message: err.to_string(),
                }
            })
        })
        .collect()
}

impl ReactionSource for JsonModel {
    fn reactions(&self) -> Result<Vec<Reaction>, ModelError> {
        self.reactions
            .iter()
            .enumerate()
            .map(|(index, rx)| {
                ReactionBuilder::default()
                    .reactants(convert_elements(&rx.reactants, index)?)
                    .products(convert_elements(&rx.products, index)?)
                    .fwd_k(rx.fwd_k)
                    .rev_k(rx.rev_k)
                    .bidirectional(rx.bidirectional)
                    .build()
                    .map_err(|err| ModelError::InvalidReaction {
                        index,
                        message: err.to_string(),
                    })
            })
            .collect()
    }

    fn initial_conditions(&self) -> Option<IndexMap<String, f64>> {
        self.initial_conditions.clone()
    }

    fn simulation_time(&self) -> Option<f64> {
        self.simulation_time
    }
}
// endregion Conversions

/// Read a Model from a json file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, IoError> {
    let json_model = JsonModel::read_from_path(path)?;
    Ok(Model::from_source(&json_model)?)
}

/// Write a Model to a json file
pub fn save_model<P: AsRef<Path>>(model: &Model, path: P) -> Result<(), IoError> {
    JsonModel::from(model).write_to_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction_network::element::ReactionElement;

    fn el(symbol: &str, coefficient: u32) -> ReactionElement {
        ReactionElement::new(symbol, coefficient).unwrap()
    }

    fn setup_model() -> Model {
        let reactions = vec![
            Reaction::reversible(vec![el("A", 2), el("B", 1)], vec![el("C", 1)], 0.2, 0.5)
                .unwrap(),
            Reaction::irreversible(vec![el("C", 3), el("D", 1)], vec![el("E", 1)], 5.0).unwrap(),
        ];
        let ic = IndexMap::from([("A".to_string(), 1.0), ("B".to_string(), 0.6)]);
        Model::new(reactions, Some(ic), Some(25.0)).unwrap()
    }

    #[test]
    fn round_trip() {
        let model = setup_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn parse_from_literal() {
        let data = r#"{
            "reactions": [
                {
                    "reactants": [{"symbol": "A", "coefficient": 1}],
                    "products": [{"symbol": "B", "coefficient": 1}],
                    "fwd_k": 0.5
                }
            ],
            "initial_conditions": {"A": 1.0},
            "simulation_time": null
        }"#;
        let json_model: JsonModel = serde_json::from_str(data).unwrap();
        let model = Model::from_source(&json_model).unwrap();
        assert_eq!(model.reactions().len(), 1);
        assert!(!model.reactions()[0].is_bidirectional());
        // Missing simulation time falls back to the configured default
        assert_eq!(model.simulation_time(), 30.0);
    }

    #[test]
    fn invalid_symbol_is_reported_with_reaction_index() {
        let data = r#"{
            "reactions": [
                {
                    "reactants": [{"symbol": "A", "coefficient": 1}],
                    "products": [{"symbol": "B", "coefficient": 1}],
                    "fwd_k": 0.5
                },
                {
                    "reactants": [{"symbol": "2X", "coefficient": 1}],
                    "products": [{"symbol": "B", "coefficient": 1}],
                    "fwd_k": 0.5
                }
            ],
            "initial_conditions": null,
            "simulation_time": null
        }"#;
        let json_model: JsonModel = serde_json::from_str(data).unwrap();
        let err = Model::from_source(&json_model).unwrap_err();
        assert!(matches!(err, ModelError::InvalidReaction { index: 1, .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_model("/nonexistent/network.json");
        assert!(matches!(result, Err(IoError::Read(_))));
    }
}
