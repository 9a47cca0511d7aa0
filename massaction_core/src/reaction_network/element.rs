//! This module provides the ReactionElement struct representing one species
//! term of a reaction (a symbol together with its stoichiometric coefficient)

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// One term of a reaction: a species symbol and its stoichiometric multiplicity
///
/// The same type is used on both sides of a reaction; whether an element acts
/// as a reactant or a product is determined by which list of the
/// [`Reaction`](crate::reaction_network::reaction::Reaction) it sits in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReactionElement {
    /// Species symbol (non-empty, alphanumeric, starting with a letter)
    symbol: String,
    /// Stoichiometric multiplicity (positive integer)
    coefficient: u32,
}

impl ReactionElement {
    /// Create a new element, validating the symbol and coefficient
    pub fn new(symbol: &str, coefficient: u32) -> Result<Self, ElementError> {
        let mut chars = symbol.chars();
        match chars.next() {
            None => return Err(ElementError::EmptySymbol),
            Some(c) if !c.is_ascii_alphabetic() => {
                return Err(ElementError::InvalidSymbol {
                    symbol: symbol.to_string(),
                })
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric()) {
            return Err(ElementError::InvalidSymbol {
                symbol: symbol.to_string(),
            });
        }
        if coefficient == 0 {
            return Err(ElementError::ZeroCoefficient {
                symbol: symbol.to_string(),
            });
        }
        Ok(ReactionElement {
            symbol: symbol.to_string(),
            coefficient,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn coefficient(&self) -> u32 {
        self.coefficient
    }
}

impl Display for ReactionElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.coefficient > 1 {
            write!(f, "{}*{}", self.coefficient, self.symbol)
        } else {
            write!(f, "{}", self.symbol)
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    #[error("species symbol cannot be empty")]
    EmptySymbol,
    #[error("species symbol `{symbol}` must be alphanumeric and start with a letter")]
    InvalidSymbol { symbol: String },
    #[error("stoichiometric coefficient of `{symbol}` must be a positive integer")]
    ZeroCoefficient { symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_symbols() {
        for symbol in ["A", "NaCl", "x2", "Enzyme1"] {
            assert!(ReactionElement::new(symbol, 1).is_ok(), "rejected {symbol}");
        }
    }

    #[test]
    fn rejects_invalid_symbols() {
        assert_eq!(
            ReactionElement::new("", 1),
            Err(ElementError::EmptySymbol)
        );
        for symbol in ["2A", "_x", "A-B", "A B"] {
            assert_eq!(
                ReactionElement::new(symbol, 1),
                Err(ElementError::InvalidSymbol {
                    symbol: symbol.to_string()
                }),
                "accepted {symbol}"
            );
        }
    }

    #[test]
    fn rejects_zero_coefficient() {
        assert_eq!(
            ReactionElement::new("A", 0),
            Err(ElementError::ZeroCoefficient {
                symbol: "A".to_string()
            })
        );
    }

    #[test]
    fn equality_by_symbol_and_coefficient() {
        let a2 = ReactionElement::new("A", 2).unwrap();
        assert_eq!(a2, ReactionElement::new("A", 2).unwrap());
        assert_ne!(a2, ReactionElement::new("A", 3).unwrap());
        assert_ne!(a2, ReactionElement::new("B", 2).unwrap());
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", ReactionElement::new("A", 1).unwrap()),
            "A"
        );
        assert_eq!(
            format!("{}", ReactionElement::new("H2O", 2).unwrap()),
            "2*H2O"
        );
    }
}
