pub use crate::{
    accumulator::{BinKey, BinnedStatAccumulator},
    binning::{AnalysisBinning, Binning},
    category::{JetCategory, LeptonCategory},
    estimator::{InstrMetEstimator, InstrMetEstimatorBuilder, PhotonRecord},
    four_momentum::FourMomentum,
    histogram::Histogram,
    lineshape::MassLineshapeSampler,
    reweight::{CascadedReweighter, ReweightGrid},
    store::{Stage, WeightTableStore},
    table::{Weight, WeightTable, WeightTable2d},
};
