use crate::category::JetCategory;

use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A one-dimensional binning given by sorted bin edges
///
/// `n + 1` edges define `n` bins. Queries outside the covered range are
/// clamped to the first or last bin, so every value maps to a valid bin
/// index.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(try_from = "Vec<N64>", into = "Vec<N64>")]
pub struct Binning {
    edges: Vec<N64>,
}

impl Binning {
    pub fn new(edges: Vec<N64>) -> Result<Self, BinningError> {
        if edges.len() < 2 {
            return Err(BinningError::TooFewEdges(edges.len()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BinningError::UnsortedEdges);
        }
        Ok(Self { edges })
    }

    /// Construct `n` equal-width bins covering [`min`, `max`)
    pub fn with_uniform_bins(n: usize, min: f64, max: f64) -> Result<Self, BinningError> {
        let width = (max - min) / n as f64;
        let edges = (0..=n).map(|i| n64(min + i as f64 * width)).collect();
        Self::new(edges)
    }

    /// The number of bins
    pub fn nbins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The bin edges
    pub fn edges(&self) -> &[N64] {
        &self.edges
    }

    /// The centre of bin `idx`
    pub fn centre(&self, idx: usize) -> N64 {
        (self.edges[idx] + self.edges[idx + 1]) / 2.
    }

    /// The index of the bin containing `x`, clamped to the covered range
    pub fn bin_index(&self, x: N64) -> usize {
        match self.edges.binary_search(&x) {
            Ok(idx) => idx.min(self.nbins() - 1),
            Err(0) => 0,
            Err(idx) => (idx - 1).min(self.nbins() - 1),
        }
    }
}

#[derive(Debug, Error)]
pub enum BinningError {
    #[error("A binning needs at least two bin edges, got {0}")]
    TooFewEdges(usize),
    #[error("Bin edges are not strictly increasing")]
    UnsortedEdges,
}

impl TryFrom<Vec<N64>> for Binning {
    type Error = BinningError;

    fn try_from(edges: Vec<N64>) -> Result<Self, Self::Error> {
        Self::new(edges)
    }
}

impl From<Binning> for Vec<N64> {
    fn from(b: Binning) -> Self {
        b.edges
    }
}

/// The internal binnings of the background estimate
///
/// The transverse-mass binning differs between jet categories; the
/// remaining axes are shared.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct AnalysisBinning {
    pub vtx: Binning,
    pub pt_thresholds: Binning,
    pub pt: Binning,
    pub mt: [Binning; JetCategory::COUNT],
}

impl AnalysisBinning {
    /// The widest transverse-mass binning over all jet categories
    pub fn max_mt_bins(&self) -> usize {
        self.mt.iter().map(|b| b.nbins()).max().unwrap_or(0)
    }
}
