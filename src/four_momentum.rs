use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};

/// Nominal Z-boson mass in GeV
pub const Z_MASS: f64 = 91.1876;

/// A basic four-momentum
///
/// The zero component is the energy component. The remainder are the
/// spatial components.
#[derive(
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Clone,
    Copy,
    Default,
)]
pub struct FourMomentum {
    pt: N64,
    p: [N64; 4],
}

impl FourMomentum {
    /// Construct a four-momentum from transverse momentum,
    /// pseudorapidity, azimuthal angle and invariant mass
    pub fn from_pt_eta_phi_m(pt: N64, eta: N64, phi: N64, m: N64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let e = (px * px + py * py + pz * pz + m * m).sqrt();
        [e, px, py, pz].into()
    }

    /// The scalar transverse momentum
    pub fn pt(&self) -> N64 {
        self.pt
    }

    /// The pseudorapidity
    pub fn eta(&self) -> N64 {
        let p = self.spatial_norm();
        ((p + self.p[3]) / (p - self.p[3])).ln() / 2.
    }

    /// The azimuthal angle
    pub fn phi(&self) -> N64 {
        self.p[2].atan2(self.p[1])
    }

    /// The invariant mass \sqrt{v_0^2 - \sum v_i^2} with i = 1,2,3
    pub fn m(&self) -> N64 {
        self.m_sq().max(n64(0.)).sqrt()
    }

    /// The invariant mass square v_0^2 - \sum v_i^2 with i = 1,2,3
    pub fn m_sq(&self) -> N64 {
        self.p[0] * self.p[0] - self.spatial_norm_sq()
    }

    /// The spatial norm \sqrt{\sum v_i^2} with i = 1,2,3
    pub fn spatial_norm(&self) -> N64 {
        self.spatial_norm_sq().sqrt()
    }

    /// The square \sum v_i^2 with i = 1,2,3 of the spatial norm
    pub fn spatial_norm_sq(&self) -> N64 {
        self.p.iter().skip(1).map(|e| *e * *e).sum()
    }

    const fn len() -> usize {
        4
    }

    fn update_pt(&mut self) {
        self.pt = (self.p[1] * self.p[1] + self.p[2] * self.p[2]).sqrt();
    }
}

impl std::convert::From<[N64; 4]> for FourMomentum {
    fn from(p: [N64; 4]) -> FourMomentum {
        let mut res = FourMomentum {
            p,
            pt: std::default::Default::default(),
        };
        res.update_pt();
        res
    }
}

impl std::ops::Index<usize> for FourMomentum {
    type Output = N64;

    fn index(&self, i: usize) -> &Self::Output {
        &self.p[i]
    }
}

impl std::ops::AddAssign for FourMomentum {
    fn add_assign(&mut self, rhs: FourMomentum) {
        for i in 0..Self::len() {
            self.p[i] += rhs[i]
        }
        self.update_pt();
    }
}

impl std::ops::Add for FourMomentum {
    type Output = Self;

    fn add(mut self, rhs: FourMomentum) -> Self::Output {
        self += rhs;
        self
    }
}

/// Transverse mass of the boson + missing-momentum system
///
/// The invisible system is assigned the nominal Z mass, so that
/// mT^2 = (E_T(B) + E_T(miss))^2 - |pT(B) + pT(miss)|^2
/// with E_T(B) = \sqrt{pT(B)^2 + m(B)^2} and
/// E_T(miss) = \sqrt{pT(miss)^2 + m_Z^2}.
pub fn transverse_mass(boson: &FourMomentum, pt_miss: &FourMomentum) -> N64 {
    let et_boson = (boson.pt() * boson.pt() + boson.m_sq().max(n64(0.))).sqrt();
    let et_miss = (pt_miss.pt() * pt_miss.pt() + n64(Z_MASS * Z_MASS)).sqrt();
    let sum_pt = (*boson + *pt_miss).pt();
    let et = et_boson + et_miss;
    (et * et - sum_pt * sum_pt).max(n64(0.)).sqrt()
}
