use crate::binning::Binning;

use itertools::izip;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

/// A one-dimensional histogram with per-bin uncertainties
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct Histogram {
    binning: Binning,
    contents: Vec<N64>,
    errors: Vec<N64>,
}

impl Histogram {
    /// Construct an empty histogram over the given binning
    pub fn new(binning: Binning) -> Self {
        let nbins = binning.nbins();
        Self {
            binning,
            contents: vec![n64(0.); nbins],
            errors: vec![n64(0.); nbins],
        }
    }

    /// Add an entry with the given weight
    ///
    /// The squared weight is added to the squared bin error, so the
    /// error tracks the usual sum-of-squared-weights statistics.
    pub fn fill(&mut self, x: N64, weight: N64) {
        let idx = self.binning.bin_index(x);
        self.contents[idx] += weight;
        let err = self.errors[idx];
        self.errors[idx] = (err * err + weight * weight).sqrt();
    }

    /// Overwrite content and error of bin `idx`
    pub fn set_bin(&mut self, idx: usize, content: N64, error: N64) {
        self.contents[idx] = content;
        self.errors[idx] = error;
    }

    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    pub fn contents(&self) -> &[N64] {
        &self.contents
    }

    pub fn errors(&self) -> &[N64] {
        &self.errors
    }

    /// Iterator over (lower edge, upper edge, content, error)
    pub fn bins(&self) -> impl Iterator<Item = (N64, N64, N64, N64)> + '_ {
        let edges = self.binning.edges();
        izip!(
            edges.iter().copied(),
            edges.iter().skip(1).copied(),
            self.contents.iter().copied(),
            self.errors.iter().copied(),
        )
    }

    /// The sum of all bin contents
    pub fn integral(&self) -> N64 {
        self.contents.iter().copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_errors() {
        let binning = Binning::new(vec![n64(0.), n64(1.), n64(2.)]).unwrap();
        let mut hist = Histogram::new(binning);
        hist.fill(n64(0.5), n64(2.));
        hist.fill(n64(0.5), n64(1.));
        hist.fill(n64(1.5), n64(3.));
        // out of range, clamped into the last bin
        hist.fill(n64(7.), n64(1.));

        assert_eq!(hist.contents(), [n64(3.), n64(4.)]);
        assert!((hist.errors()[0] - 5f64.sqrt()).abs() < 1e-12);
        assert!((hist.errors()[1] - 10f64.sqrt()).abs() < 1e-12);
        assert_eq!(hist.integral(), 7.);
    }
}
