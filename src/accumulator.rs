use noisy_float::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binning::AnalysisBinning;
use crate::category::{JetCategory, LeptonCategory};
use crate::histogram::Histogram;
use crate::reweight::ReweightGrid;

/// The discrete coordinates of one accumulator cell
///
/// All bin indices are clamped to the covered range when computed from
/// physical quantities, so out-of-range values land in the first or
/// last bin instead of being lost.
#[derive(Deserialize, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BinKey {
    pub lep: LeptonCategory,
    pub jet: JetCategory,
    pub mt_bin: usize,
    pub vtx_bin: usize,
    pub thr_bin: usize,
    pub pt_bin: usize,
}

impl BinKey {
    /// Compute the key for an event from its physical observables
    pub fn from_observables(
        binning: &AnalysisBinning,
        lep: LeptonCategory,
        jet: JetCategory,
        mt: N64,
        nvtx: N64,
        boson_pt: N64,
    ) -> Self {
        Self {
            lep,
            jet,
            mt_bin: binning.mt[jet.idx()].bin_index(mt),
            vtx_bin: binning.vtx.bin_index(nvtx),
            thr_bin: binning.pt_thresholds.bin_index(boson_pt),
            pt_bin: binning.pt.bin_index(boson_pt),
        }
    }
}

/// Running sums for one cell
///
/// Both sums use the weight the event would have had without the
/// photon reweighting factor, so the factor and its uncertainty can be
/// folded in once at finalization.
#[derive(Deserialize, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct AccumulatorCell {
    pub weighted_sum: N64,
    pub weighted_sum_sq: N64,
}

impl AccumulatorCell {
    fn zero() -> Self {
        Self {
            weighted_sum: n64(0.),
            weighted_sum_sq: n64(0.),
        }
    }

    fn add(&mut self, weight: N64) {
        self.weighted_sum += weight;
        self.weighted_sum_sq += weight * weight;
    }

    fn merge(&mut self, other: &Self) {
        self.weighted_sum += other.weighted_sum;
        self.weighted_sum_sq += other.weighted_sum_sq;
    }
}

/// Aggregation of weighted event counts over the full bin grid
///
/// Accumulators for disjoint event ranges can be merged by elementwise
/// addition; [finalize](Self::finalize) must then run exactly once, on
/// the merged result.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BinnedStatAccumulator {
    binning: AnalysisBinning,
    mt_bins: usize,
    cells: Vec<AccumulatorCell>,
}

impl BinnedStatAccumulator {
    pub fn new(binning: AnalysisBinning) -> Self {
        let mt_bins = binning.max_mt_bins();
        let ncells = LeptonCategory::COUNT
            * JetCategory::COUNT
            * mt_bins
            * binning.vtx.nbins()
            * binning.pt_thresholds.nbins()
            * binning.pt.nbins();
        Self {
            binning,
            mt_bins,
            cells: vec![AccumulatorCell::zero(); ncells],
        }
    }

    pub fn binning(&self) -> &AnalysisBinning {
        &self.binning
    }

    /// Add one event with its pre-reweighting weight
    ///
    /// Must be called exactly once per event and output category that
    /// passes the selection. A second call for the same event silently
    /// doubles the yield, so the caller has to guarantee this.
    pub fn record(&mut self, key: &BinKey, weight: N64) {
        let idx = self.index(key);
        self.cells[idx].add(weight);
    }

    /// Elementwise addition of the sums of `other`
    pub fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.binning != other.binning {
            return Err(MergeError::BinningMismatch);
        }
        for (cell, other) in self.cells.iter_mut().zip(&other.cells) {
            cell.merge(other);
        }
        Ok(())
    }

    /// Combine the accumulated sums with the reweighting factors
    ///
    /// For every output bin the contents of all (vertex, pT-threshold,
    /// boson-pT) sub-keys are summed as
    ///
    /// content += S * f
    /// error^2 += f^2 * S_2 + S^2 * sigma_f^2
    ///
    /// with S the weighted sum, S_2 the squared-weight sum and f ±
    /// sigma_f the factor of the sub-key. This is the variance of a
    /// product of independent quantities, summed under the assumption
    /// that different sub-keys are independent. Empty sub-keys
    /// contribute exactly zero to both sums; no division occurs.
    pub fn finalize(
        &self,
        grid: &ReweightGrid,
    ) -> Vec<((LeptonCategory, JetCategory), Histogram)> {
        let categories: Vec<_> = LeptonCategory::DILEPTON
            .into_iter()
            .flat_map(|lep| JetCategory::ALL.into_iter().map(move |jet| (lep, jet)))
            .collect();
        categories
            .into_par_iter()
            .map(|(lep, jet)| {
                let mt_binning = &self.binning.mt[jet.idx()];
                let mut hist = Histogram::new(mt_binning.clone());
                for mt in 0..mt_binning.nbins() {
                    let mut content = n64(0.);
                    let mut error_sq = n64(0.);
                    for vtx in 0..self.binning.vtx.nbins() {
                        for thr in 0..self.binning.pt_thresholds.nbins() {
                            for pt in 0..self.binning.pt.nbins() {
                                let key = BinKey {
                                    lep,
                                    jet,
                                    mt_bin: mt,
                                    vtx_bin: vtx,
                                    thr_bin: thr,
                                    pt_bin: pt,
                                };
                                let cell = &self.cells[self.index(&key)];
                                let factor = grid.factor(lep, jet, vtx, thr, pt);
                                content += cell.weighted_sum * factor.value;
                                error_sq += factor.value * factor.value
                                    * cell.weighted_sum_sq
                                    + cell.weighted_sum * cell.weighted_sum
                                        * factor.uncertainty
                                        * factor.uncertainty;
                            }
                        }
                    }
                    hist.set_bin(mt, content, error_sq.sqrt());
                }
                ((lep, jet), hist)
            })
            .collect()
    }

    fn index(&self, key: &BinKey) -> usize {
        ((((key.lep.idx() * JetCategory::COUNT + key.jet.idx()) * self.mt_bins
            + key.mt_bin)
            * self.binning.vtx.nbins()
            + key.vtx_bin)
            * self.binning.pt_thresholds.nbins()
            + key.thr_bin)
            * self.binning.pt.nbins()
            + key.pt_bin
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Cannot merge accumulators with different binnings")]
    BinningMismatch,
}
