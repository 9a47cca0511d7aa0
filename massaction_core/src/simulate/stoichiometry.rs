//! This module builds the stoichiometry matrix and the rate-constant vector
//! from an ordered reaction list

use nalgebra::{DMatrix, DVector};

use crate::reaction_network::reaction::Reaction;
use crate::reaction_network::species_index::SpeciesIndex;

/// Build the `N x 2J` stoichiometry matrix for `N` species and `J` reactions
///
/// Column `j` (for `j < J`) holds the net change of each species per unit of
/// forward progress of reaction `j`: `-coefficient` for reactants,
/// `+coefficient` for products. Column `j + J` is the exact negation of
/// column `j`, encoding the reverse reaction as the forward stoichiometry run
/// backward.
pub fn stoichiometry_matrix(index: &SpeciesIndex, reactions: &[Reaction]) -> DMatrix<f64> {
    let n = index.len();
    let j_count = reactions.len();
    let mut stoich: DMatrix<f64> = DMatrix::zeros(n, 2 * j_count);
    for (j, rx) in reactions.iter().enumerate() {
        for reactant in rx.reactants() {
            let row = row_of(index, reactant.symbol());
            stoich[(row, j)] -= f64::from(reactant.coefficient());
        }
        for product in rx.products() {
            let row = row_of(index, product.symbol());
            stoich[(row, j)] += f64::from(product.coefficient());
        }
        for row in 0..n {
            stoich[(row, j + j_count)] = -stoich[(row, j)];
        }
    }
    stoich
}

/// Extract the length-`2J` rate-constant vector from the ordered reaction list
///
/// Position `q` holds the forward constant of reaction `q` and position
/// `q + J` its reverse constant. This layout is the canonical contract for
/// interpreting externally supplied rate-constant vectors.
pub fn rate_constant_vector(reactions: &[Reaction]) -> DVector<f64> {
    let j_count = reactions.len();
    let mut k = DVector::zeros(2 * j_count);
    for (q, rx) in reactions.iter().enumerate() {
        k[q] = rx.fwd_k();
        k[q + j_count] = rx.rev_k();
    }
    k
}

pub(crate) fn row_of(index: &SpeciesIndex, symbol: &str) -> usize {
    index
        .index_of(symbol)
        .expect("species index covers every symbol in the reaction list")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction_network::element::ReactionElement;

    fn el(symbol: &str, coefficient: u32) -> ReactionElement {
        ReactionElement::new(symbol, coefficient).unwrap()
    }

    fn setup_reactions() -> Vec<Reaction> {
        vec![
            Reaction::reversible(vec![el("A", 2), el("B", 1)], vec![el("C", 1)], 0.2, 0.5)
                .unwrap(),
            Reaction::irreversible(vec![el("C", 3), el("D", 1)], vec![el("E", 1)], 5.0).unwrap(),
        ]
    }

    #[test]
    fn forward_columns() {
        let reactions = setup_reactions();
        let index = SpeciesIndex::build(&reactions);
        let stoich = stoichiometry_matrix(&index, &reactions);
        assert_eq!(stoich.shape(), (5, 4));
        let col0: Vec<f64> = stoich.column(0).iter().copied().collect();
        let col1: Vec<f64> = stoich.column(1).iter().copied().collect();
        assert_eq!(col0, vec![-2.0, -1.0, 1.0, 0.0, 0.0]);
        assert_eq!(col1, vec![0.0, 0.0, -3.0, -1.0, 1.0]);
    }

    #[test]
    fn reverse_columns_negate_forward() {
        let reactions = setup_reactions();
        let index = SpeciesIndex::build(&reactions);
        let stoich = stoichiometry_matrix(&index, &reactions);
        for j in 0..2 {
            for row in 0..5 {
                assert_eq!(stoich[(row, j + 2)], -stoich[(row, j)]);
            }
        }
    }

    #[test]
    fn rate_constant_layout() {
        let k = rate_constant_vector(&setup_reactions());
        assert_eq!(k.as_slice(), &[0.2, 5.0, 0.5, 0.0]);
    }
}
