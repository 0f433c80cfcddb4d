use log::debug;
use noisy_float::prelude::*;
use thiserror::Error;

use crate::binning::AnalysisBinning;
use crate::category::{JetCategory, LeptonCategory};
use crate::store::WeightTableStore;
use crate::table::{OutOfRange, Weight};

/// Per-event evaluation of the cascaded photon-to-dilepton reweighting
///
/// The vertex-count stage is looked up first, then the boson-pT stage.
/// The order is load bearing: the pT tables were derived from a sample
/// that had the vertex reweighting already applied.
pub struct CascadedReweighter<'a> {
    store: &'a WeightTableStore,
}

impl<'a> CascadedReweighter<'a> {
    pub fn new(store: &'a WeightTableStore) -> Self {
        Self { store }
    }

    /// The combined reweighting factor for a single event
    ///
    /// A factor of exactly 0 is a legitimate result and must be
    /// recorded by the caller, not skipped: a bin with vanishing
    /// reweighting density is meaningful information about coverage.
    pub fn evaluate(
        &self,
        lep: LeptonCategory,
        jet: JetCategory,
        nvtx: N64,
        boson_pt: N64,
    ) -> Result<Weight, EvaluateError> {
        let nvtx_table = self
            .store
            .nvtx_table(lep)
            .ok_or(EvaluateError::MissingVertexTable(lep))?;
        let vtx_weight = nvtx_table.lookup(nvtx, boson_pt)?;
        let pt_weight = match self.store.pt_table(lep, jet) {
            Some(table) => table.lookup(boson_pt)?,
            None => Weight::unit(),
        };
        Ok(vtx_weight.product(pt_weight))
    }
}

/// Precomputed reweighting factors on the internal bin grid
///
/// Factors are a pure function of the (vertex bin, pT-threshold bin,
/// boson-pT bin) sub-key and are computed once at the bin centres of
/// the internal binnings, before the event loop. Sub-keys below the
/// table range keep a factor of 0 ± 0 and contribute nothing at
/// finalization.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReweightGrid {
    nvtx_bins: usize,
    thr_bins: usize,
    pt_bins: usize,
    cells: Vec<Weight>,
}

impl ReweightGrid {
    /// Evaluate the factor grid from the loaded weight tables
    pub fn precompute(
        store: &WeightTableStore,
        binning: &AnalysisBinning,
    ) -> Result<Self, EvaluateError> {
        let mut grid = Self::with_factor(binning, Weight::new(n64(0.), n64(0.)));
        for lep in LeptonCategory::DILEPTON {
            let nvtx_table = store
                .nvtx_table(lep)
                .ok_or(EvaluateError::MissingVertexTable(lep))?;
            for jet in JetCategory::ALL {
                for vtx in 0..grid.nvtx_bins {
                    for thr in 0..grid.thr_bins {
                        let vtx_weight = match nvtx_table.lookup(
                            binning.vtx.edges()[vtx],
                            binning.pt_thresholds.centre(thr),
                        ) {
                            Ok(w) => w,
                            Err(_) => continue,
                        };
                        for pt in 0..grid.pt_bins {
                            let pt_weight = match store.pt_table(lep, jet) {
                                Some(table) => {
                                    match table.lookup(binning.pt.centre(pt)) {
                                        Ok(w) => w,
                                        Err(_) => continue,
                                    }
                                }
                                None => Weight::unit(),
                            };
                            let idx = grid.index(lep, jet, vtx, thr, pt);
                            grid.cells[idx] = vtx_weight.product(pt_weight);
                        }
                    }
                }
            }
        }
        let nonzero = grid.cells.iter().filter(|w| w.value != 0.).count();
        debug!(
            "Precomputed {} reweighting factors ({nonzero} non-zero)",
            grid.cells.len()
        );
        Ok(grid)
    }

    /// A grid with every factor set to 1 ± 0
    ///
    /// Used when reweighting is disabled, so that finalization reduces
    /// to the raw, non-reweighted distribution.
    pub fn neutral(binning: &AnalysisBinning) -> Self {
        Self::with_factor(binning, Weight::unit())
    }

    fn with_factor(binning: &AnalysisBinning, factor: Weight) -> Self {
        let nvtx_bins = binning.vtx.nbins();
        let thr_bins = binning.pt_thresholds.nbins();
        let pt_bins = binning.pt.nbins();
        let ncells =
            LeptonCategory::COUNT * JetCategory::COUNT * nvtx_bins * thr_bins * pt_bins;
        Self {
            nvtx_bins,
            thr_bins,
            pt_bins,
            cells: vec![factor; ncells],
        }
    }

    fn index(
        &self,
        lep: LeptonCategory,
        jet: JetCategory,
        vtx: usize,
        thr: usize,
        pt: usize,
    ) -> usize {
        (((lep.idx() * JetCategory::COUNT + jet.idx()) * self.nvtx_bins + vtx)
            * self.thr_bins
            + thr)
            * self.pt_bins
            + pt
    }

    /// The factor for the given sub-key
    pub fn factor(
        &self,
        lep: LeptonCategory,
        jet: JetCategory,
        vtx: usize,
        thr: usize,
        pt: usize,
    ) -> Weight {
        self.cells[self.index(lep, jet, vtx, thr, pt)]
    }
}

#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error("No vertex-count weight table for lepton category {0}")]
    MissingVertexTable(LeptonCategory),
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Binning;
    use crate::table::{TableData, TableData2d, WeightTable, WeightTable2d};

    fn store() -> WeightTableStore {
        let mut store = WeightTableStore::empty();
        for lep in LeptonCategory::DILEPTON {
            let row = TableData {
                edges: vec![n64(55.)],
                values: vec![n64(1.2)],
                errors: vec![n64(0.1)],
            };
            let nvtx = TableData2d {
                outer_edges: vec![n64(0.)],
                rows: vec![row],
            };
            store.insert_nvtx(lep, WeightTable2d::from_data("nvtx", nvtx).unwrap());
            for jet in JetCategory::ALL {
                let pt = TableData {
                    edges: vec![n64(55.), n64(100.)],
                    values: vec![n64(0.9), n64(0.)],
                    errors: vec![n64(0.05), n64(0.)],
                };
                store.insert_pt(lep, jet, WeightTable::from_data("pt", pt).unwrap());
            }
        }
        store
    }

    #[test]
    fn composition() {
        let store = store();
        let reweighter = CascadedReweighter::new(&store);
        let w = reweighter
            .evaluate(
                LeptonCategory::Ee,
                JetCategory::Eq0Jets,
                n64(20.),
                n64(60.),
            )
            .unwrap();
        assert!((w.value - 1.08).abs() < 1e-12);
        let expect = 1.08 * ((0.1f64 / 1.2).powi(2) + (0.05f64 / 0.9).powi(2)).sqrt();
        assert!((w.uncertainty - expect).abs() < 1e-12);
        assert!((w.uncertainty - 0.1084).abs() < 1e-3);
    }

    #[test]
    fn zero_factor() {
        let store = store();
        let reweighter = CascadedReweighter::new(&store);
        // boson pt in the zero-valued bin of the pt table
        let w = reweighter
            .evaluate(
                LeptonCategory::Ll,
                JetCategory::Vbf,
                n64(20.),
                n64(150.),
            )
            .unwrap();
        assert_eq!(w, Weight::new(n64(0.), n64(0.)));
    }

    #[test]
    fn out_of_range_is_fatal() {
        let store = store();
        let reweighter = CascadedReweighter::new(&store);
        let err = reweighter
            .evaluate(
                LeptonCategory::Ee,
                JetCategory::Eq0Jets,
                n64(20.),
                n64(10.),
            )
            .unwrap_err();
        assert!(matches!(err, EvaluateError::OutOfRange(_)));
    }

    #[test]
    fn missing_vertex_table() {
        let store = store();
        let reweighter = CascadedReweighter::new(&store);
        let err = reweighter
            .evaluate(
                LeptonCategory::Gamma,
                JetCategory::Eq0Jets,
                n64(20.),
                n64(60.),
            )
            .unwrap_err();
        assert!(matches!(err, EvaluateError::MissingVertexTable(_)));
    }

    fn binning() -> AnalysisBinning {
        let mt = Binning::new(vec![n64(0.), n64(200.), n64(400.)]).unwrap();
        AnalysisBinning {
            vtx: Binning::new(vec![n64(0.), n64(20.), n64(40.)]).unwrap(),
            pt_thresholds: Binning::new(vec![n64(55.), n64(100.)]).unwrap(),
            pt: Binning::new(vec![n64(55.), n64(100.), n64(200.)]).unwrap(),
            mt: [mt.clone(), mt.clone(), mt],
        }
    }

    #[test]
    fn precomputed_grid() {
        let store = store();
        let binning = binning();
        let grid = ReweightGrid::precompute(&store, &binning).unwrap();
        let w = grid.factor(LeptonCategory::Ee, JetCategory::Eq0Jets, 0, 0, 0);
        assert!((w.value - 1.08).abs() < 1e-12);
        // second pt bin hits the zero-valued entry of the pt table
        let w = grid.factor(LeptonCategory::Ee, JetCategory::Eq0Jets, 0, 0, 1);
        assert_eq!(w.value, 0.);
    }

    #[test]
    fn neutral_grid() {
        let grid = ReweightGrid::neutral(&binning());
        let w = grid.factor(LeptonCategory::MuMu, JetCategory::Vbf, 1, 0, 1);
        assert_eq!(w, Weight::unit());
    }
}
