//! This module provides the mass-action rate laws of a reaction network as
//! independently evaluable value objects
//!
//! The original formulation generated one closure per rate-law slot; here each
//! slot is an explicit [`RateLaw`] holding its own index/exponent pairs and
//! rate constant, so evaluations cannot share mutable state across slots.

use nalgebra::DVector;

use crate::reaction_network::element::ReactionElement;
use crate::reaction_network::reaction::Reaction;
use crate::reaction_network::species_index::SpeciesIndex;
use crate::simulate::stoichiometry::row_of;

/// One mass-action rate law: `rate = k * prod(X[idx]^exponent)`
///
/// The index/exponent pairs and the rate constant are bound at construction
/// and never change afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLaw {
    rate_constant: f64,
    /// (concentration index, exponent) per participating species
    terms: Vec<(usize, u32)>,
}

impl RateLaw {
    pub fn new(rate_constant: f64, terms: Vec<(usize, u32)>) -> RateLaw {
        RateLaw {
            rate_constant,
            terms,
        }
    }

    pub fn rate_constant(&self) -> f64 {
        self.rate_constant
    }

    /// Evaluate the rate at the concentration vector `x`
    pub fn evaluate(&self, x: &DVector<f64>) -> f64 {
        let mut rate = self.rate_constant;
        for &(idx, power) in &self.terms {
            rate *= x[idx].powi(power as i32);
        }
        rate
    }
}

/// The full table of `2J` rate laws for a `J`-reaction network
///
/// Slot `j < J` is the forward law of reaction `j` (mass-action product over
/// its reactants); slot `j + J` is the reverse law (product over its
/// products). The reverse slot of a unidirectional reaction carries a rate
/// constant of exactly zero, so it evaluates to zero for any concentrations.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLawTable {
    laws: Vec<RateLaw>,
}

impl RateLawTable {
    /// Build the table from the ordered reaction list
    pub fn from_reactions(index: &SpeciesIndex, reactions: &[Reaction]) -> RateLawTable {
        let j_count = reactions.len();
        let mut laws = vec![RateLaw::new(0.0, vec![]); 2 * j_count];
        for (j, rx) in reactions.iter().enumerate() {
            laws[j] = Self::law_for(index, rx.reactants(), rx.fwd_k());
            laws[j + j_count] = Self::law_for(index, rx.products(), rx.rev_k());
        }
        RateLawTable { laws }
    }

    fn law_for(index: &SpeciesIndex, elements: &[ReactionElement], k: f64) -> RateLaw {
        let terms = elements
            .iter()
            .map(|e| (row_of(index, e.symbol()), e.coefficient()))
            .collect();
        RateLaw::new(k, terms)
    }

    /// Number of rate-law slots (`2J`)
    pub fn len(&self) -> usize {
        self.laws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }

    pub fn law(&self, slot: usize) -> &RateLaw {
        &self.laws[slot]
    }

    /// Evaluate all slots at `x`, producing the length-`2J` rate vector
    pub fn rate_vector(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.laws.len(), self.laws.iter().map(|law| law.evaluate(x)))
    }

    /// Replace the bound rate constants with an externally supplied vector,
    /// ordered per the canonical reaction-order contract
    ///
    /// # Panics
    /// Panics if `k` does not have one entry per rate-law slot.
    pub fn with_rate_constants(&self, k: &DVector<f64>) -> RateLawTable {
        assert_eq!(
            k.len(),
            self.laws.len(),
            "rate-constant vector must have one entry per rate-law slot"
        );
        let laws = self
            .laws
            .iter()
            .zip(k.iter())
            .map(|(law, &k)| RateLaw::new(k, law.terms.clone()))
            .collect();
        RateLawTable { laws }
    }
}
