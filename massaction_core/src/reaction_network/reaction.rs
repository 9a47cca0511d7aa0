//! This module provides a struct for representing reactions

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

use crate::reaction_network::element::ReactionElement;

/// A single reaction of the network, transforming reactants into products
/// under mass-action kinetics
///
/// A unidirectional reaction carries a forward rate constant only; its reverse
/// rate constant is pinned to zero. A bidirectional reaction additionally
/// carries a reverse rate constant for the product-side back reaction.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Reaction {
    /// Species consumed by the forward reaction, with stoichiometric coefficients
    pub reactants: Vec<ReactionElement>,
    /// Species produced by the forward reaction, with stoichiometric coefficients
    pub products: Vec<ReactionElement>,
    /// Forward rate constant (non-negative)
    pub fwd_k: f64,
    /// Reverse rate constant (non-negative, exactly zero if unidirectional)
    #[builder(default = "0.0")]
    pub rev_k: f64,
    /// Whether the reaction runs in both directions
    #[builder(default = "false")]
    pub bidirectional: bool,
}

impl ReactionBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.reactants.as_ref().is_some_and(|r| r.is_empty()) {
            return Err("a reaction requires at least one reactant".to_string());
        }
        if self.products.as_ref().is_some_and(|p| p.is_empty()) {
            return Err("a reaction requires at least one product".to_string());
        }
        if let Some(fwd_k) = self.fwd_k {
            if !fwd_k.is_finite() || fwd_k < 0.0 {
                return Err(format!(
                    "forward rate constant must be finite and non-negative (got {fwd_k})"
                ));
            }
        }
        let rev_k = self.rev_k.unwrap_or(0.0);
        if !rev_k.is_finite() || rev_k < 0.0 {
            return Err(format!(
                "reverse rate constant must be finite and non-negative (got {rev_k})"
            ));
        }
        if !self.bidirectional.unwrap_or(false) && rev_k != 0.0 {
            return Err(format!(
                "a unidirectional reaction cannot have a reverse rate constant (got {rev_k})"
            ));
        }
        Ok(())
    }
}

impl Reaction {
    /// Create a unidirectional reaction (reverse rate constant pinned to zero)
    pub fn irreversible(
        reactants: Vec<ReactionElement>,
        products: Vec<ReactionElement>,
        fwd_k: f64,
    ) -> Result<Reaction, ReactionBuilderError> {
        ReactionBuilder::default()
            .reactants(reactants)
            .products(products)
            .fwd_k(fwd_k)
            .build()
    }

    /// Create a bidirectional reaction
    pub fn reversible(
        reactants: Vec<ReactionElement>,
        products: Vec<ReactionElement>,
        fwd_k: f64,
        rev_k: f64,
    ) -> Result<Reaction, ReactionBuilderError> {
        ReactionBuilder::default()
            .reactants(reactants)
            .products(products)
            .fwd_k(fwd_k)
            .rev_k(rev_k)
            .bidirectional(true)
            .build()
    }

    pub fn reactants(&self) -> &[ReactionElement] {
        &self.reactants
    }

    pub fn products(&self) -> &[ReactionElement] {
        &self.products
    }

    pub fn fwd_k(&self) -> f64 {
        self.fwd_k
    }

    pub fn rev_k(&self) -> f64 {
        self.rev_k
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    /// The set of species symbols appearing on either side of the reaction
    pub fn all_species(&self) -> BTreeSet<&str> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .map(|e| e.symbol())
            .collect()
    }
}

impl Display for Reaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let side = |elements: &[ReactionElement]| {
            elements
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        if self.bidirectional {
            write!(
                f,
                "{} <--{}, {}--> {}",
                side(&self.reactants),
                self.fwd_k,
                self.rev_k,
                side(&self.products)
            )
        } else {
            write!(
                f,
                "{} --{}--> {}",
                side(&self.reactants),
                self.fwd_k,
                side(&self.products)
            )
        }
    }
}
