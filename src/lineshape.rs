use crate::category::LeptonCategory;
use crate::four_momentum::{FourMomentum, Z_MASS};

use log::debug;
use noisy_float::prelude::*;
use rand::distributions::{Distribution, Uniform, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Half-width of the mass acceptance window around the nominal Z mass
pub const MASS_WINDOW: f64 = 15.;

/// Upper bound on redraws before sampling is considered stuck
///
/// The empirical lineshapes are concentrated inside the acceptance
/// window, so in practice a handful of draws suffices. The cap turns a
/// pathological input distribution into a diagnosable error instead of
/// an endless loop.
const MAX_DRAWS: usize = 10_000;

/// Raw content of an empirical mass distribution
///
/// `n + 1` edges delimit `n` bins with the given relative weights.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct LineshapeData {
    pub edges: Vec<N64>,
    pub weights: Vec<N64>,
}

/// An empirical resonance-mass distribution
#[derive(Clone, Debug)]
pub struct Lineshape {
    name: String,
    edges: Vec<N64>,
    bin_dist: WeightedIndex<f64>,
}

impl Lineshape {
    pub fn from_data(name: &str, data: LineshapeData) -> Result<Self, LineshapeError> {
        let LineshapeData { edges, weights } = data;
        if edges.len() != weights.len() + 1 {
            return Err(LineshapeError::LengthMismatch {
                name: name.to_owned(),
                edges: edges.len(),
                weights: weights.len(),
            });
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(LineshapeError::UnsortedEdges {
                name: name.to_owned(),
            });
        }
        let bin_dist = WeightedIndex::new(weights.iter().map(|w| f64::from(*w)))
            .map_err(|_| LineshapeError::NoMass {
                name: name.to_owned(),
            })?;
        Ok(Self {
            name: name.to_owned(),
            edges,
            bin_dist,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Draw one mass value from the distribution
    ///
    /// A bin is chosen with probability proportional to its weight and
    /// the mass drawn uniformly inside it.
    fn draw<R: Rng>(&self, rng: &mut R) -> N64 {
        let idx = self.bin_dist.sample(rng);
        let lo = f64::from(self.edges[idx]);
        let hi = f64::from(self.edges[idx + 1]);
        n64(Uniform::new(lo, hi).sample(rng))
    }

    /// Draw a mass inside the acceptance window around the Z mass
    ///
    /// Candidates outside |m - m_Z| <= [MASS_WINDOW] are rejected and
    /// redrawn.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<N64, LineshapeError> {
        for _ in 0..MAX_DRAWS {
            let m = self.draw(rng);
            if (m - Z_MASS).abs() <= MASS_WINDOW {
                return Ok(m);
            }
        }
        Err(LineshapeError::AcceptanceExhausted {
            name: self.name.clone(),
            draws: MAX_DRAWS,
        })
    }
}

/// Per-category mass sampling for photon events
#[derive(Debug)]
pub struct MassLineshapeSampler {
    shapes: [Option<Lineshape>; LeptonCategory::COUNT],
}

impl MassLineshapeSampler {
    pub fn new() -> Self {
        Self {
            shapes: Default::default(),
        }
    }

    pub fn insert(&mut self, cat: LeptonCategory, shape: Lineshape) {
        debug!("Loaded mass lineshape `{}` for category {cat}", shape.name());
        self.shapes[cat.idx()] = Some(shape);
    }

    pub fn has_category(&self, cat: LeptonCategory) -> bool {
        self.shapes[cat.idx()].is_some()
    }

    /// Draw a boson mass for the given lepton category
    pub fn sample<R: Rng>(
        &self,
        cat: LeptonCategory,
        rng: &mut R,
    ) -> Result<N64, LineshapeError> {
        let shape = self.shapes[cat.idx()]
            .as_ref()
            .ok_or(LineshapeError::MissingCategory { cat })?;
        shape.sample(rng)
    }
}

impl Default for MassLineshapeSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the (vanishing) photon mass by a sampled boson mass
///
/// Transverse momentum, pseudorapidity and azimuth are held fixed; the
/// energy component is recomputed from E^2 = p^2 + m^2. Derived
/// observables must be recomputed from the returned four-momentum.
pub fn promote_to_massive(photon: &FourMomentum, mass: N64) -> FourMomentum {
    FourMomentum::from_pt_eta_phi_m(photon.pt(), photon.eta(), photon.phi(), mass)
}

#[derive(Debug, Error)]
pub enum LineshapeError {
    #[error("Mass lineshape `{name}` has {edges} bin edges for {weights} weights")]
    LengthMismatch {
        name: String,
        edges: usize,
        weights: usize,
    },
    #[error("Bin edges of mass lineshape `{name}` are not strictly increasing")]
    UnsortedEdges { name: String },
    #[error("Mass lineshape `{name}` has no probability mass")]
    NoMass { name: String },
    #[error(
        "No mass candidate inside the acceptance window after {draws} draws \
         from mass lineshape `{name}`"
    )]
    AcceptanceExhausted { name: String, draws: usize },
    #[error("No mass lineshape loaded for lepton category {cat}")]
    MissingCategory { cat: LeptonCategory },
}
