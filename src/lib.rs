//! `instrmet` estimates the irreducible instrumental missing-ET
//! background of a Z(ll)+MET search from photon-triggered events.
//!
//! Photon events are reweighted so that their vertex-count and
//! boson-pT distributions mimic the dilepton sample, a boson mass
//! drawn from an empirical lineshape replaces the vanishing photon
//! mass, and the transverse-mass distribution is accumulated with
//! statistically correct per-bin uncertainties.
//!
//! # How to use
//!
//! Load the weight tables into a [store::WeightTableStore], build an
//! [estimator::InstrMetEstimator] from it, feed it the selected
//! photon events and finalize once.
//!
//! ## Most relevant modules
//!
//! - [prelude] exports a list of the most relevant classes and objects
//! - [store] loads and owns the auxiliary weight tables
//! - [reweight] evaluates the cascaded reweighting factors
//! - [lineshape] samples the boson mass lineshape
//! - [accumulator] aggregates the weighted event counts
//! - [estimator] ties the pieces together into the event loop
//!

/// Aggregation of weighted event counts with error propagation
pub mod accumulator;
/// Bin-edge based binnings of the internal axes
pub mod binning;
/// Lepton and jet category enumerations
pub mod category;
/// The top-level background estimator
pub mod estimator;
/// Four-momentum class
pub mod four_momentum;
/// Histograms with per-bin uncertainties
pub mod histogram;
/// Empirical mass lineshapes and rejection sampling
pub mod lineshape;
/// Most important exports
pub mod prelude;
/// Cascaded reweighting factors
pub mod reweight;
/// Weight table loading and bookkeeping
pub mod store;
/// Piecewise-constant weight tables
pub mod table;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
