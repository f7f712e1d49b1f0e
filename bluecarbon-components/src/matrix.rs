//! Sparse matrices indexed by landcover transition.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Integer landcover code.
pub type LandcoverCode = i64;

/// One populated cell of a [`TransitionMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub from: LandcoverCode,
    pub to: LandcoverCode,
    pub value: f32,
}

/// A sparse `(from_code, to_code) -> value` lookup.
///
/// Most landcover pairs are not modelled transitions, so only populated cells
/// are stored and every other pair reads as `0.0`.
///
/// Serialises as a list of entries sorted by `(from, to)` so that equal
/// matrices always serialise identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TransitionEntry>", into = "Vec<TransitionEntry>")]
pub struct TransitionMatrix {
    values: HashMap<(LandcoverCode, LandcoverCode), f32>,
}

impl TransitionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for a transition, returning the value it replaced.
    pub fn insert(&mut self, from: LandcoverCode, to: LandcoverCode, value: f32) -> Option<f32> {
        self.values.insert((from, to), value)
    }

    /// Value for a transition, `0.0` when the pair is not populated.
    pub fn get(&self, from: LandcoverCode, to: LandcoverCode) -> f32 {
        self.values.get(&(from, to)).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, from: LandcoverCode, to: LandcoverCode) -> bool {
        self.values.contains_key(&(from, to))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Populated cells sorted by `(from, to)`.
    pub fn entries(&self) -> Vec<TransitionEntry> {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .map(|(&(from, to), &value)| TransitionEntry { from, to, value })
            .collect();
        entries.sort_by_key(|e| (e.from, e.to));
        entries
    }
}

impl From<Vec<TransitionEntry>> for TransitionMatrix {
    fn from(entries: Vec<TransitionEntry>) -> Self {
        Self {
            values: entries
                .into_iter()
                .map(|e| ((e.from, e.to), e.value))
                .collect(),
        }
    }
}

impl From<TransitionMatrix> for Vec<TransitionEntry> {
    fn from(matrix: TransitionMatrix) -> Self {
        matrix.entries()
    }
}
