//! This module provides the SpeciesIndex struct mapping species symbols to
//! array positions

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::reaction_network::reaction::Reaction;

/// A deterministic bijection between species symbols and positions in the
/// concentration vector
///
/// Indices are assigned by lexicographic symbol order, so identical reaction
/// sets always produce the same array layout. Callers must use this mapping to
/// interpret the columns of a trajectory matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeciesIndex {
    index: IndexMap<String, usize>,
}

impl SpeciesIndex {
    /// Build the index covering exactly the species referenced by `reactions`
    pub fn build(reactions: &[Reaction]) -> SpeciesIndex {
        let sorted: BTreeSet<&str> = reactions.iter().flat_map(|rx| rx.all_species()).collect();
        let index = sorted
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.to_string(), i))
            .collect();
        SpeciesIndex { index }
    }

    /// The array position of `symbol`, if the species is part of the network
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    /// Number of species covered by the index
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Species symbols in index order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(|s| s.as_str())
    }

    /// (symbol, index) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index.iter().map(|(s, &i)| (s.as_str(), i))
    }
}
