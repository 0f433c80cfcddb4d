use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Final-state lepton flavour classification
///
/// Photon events are reweighted into each of the dilepton categories
/// [Ee](LeptonCategory::Ee), [MuMu](LeptonCategory::MuMu) and
/// [Ll](LeptonCategory::Ll). The remaining variants key other parts of
/// the parent analysis and never receive photon reweighting.
#[derive(
    Deserialize,
    Serialize,
    Display,
    EnumIter,
    EnumString,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeptonCategory {
    Ee,
    MuMu,
    Ll,
    EMu,
    Gamma,
}

impl LeptonCategory {
    pub const COUNT: usize = 5;

    /// Categories a photon event is reweighted into
    pub const DILEPTON: [LeptonCategory; 3] = [Self::Ee, Self::MuMu, Self::Ll];

    pub const fn idx(self) -> usize {
        self as usize
    }
}

/// Jet multiplicity/topology classification
#[derive(
    Deserialize,
    Serialize,
    Display,
    EnumIter,
    EnumString,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JetCategory {
    Eq0Jets,
    Geq1Jets,
    Vbf,
}

impl JetCategory {
    pub const COUNT: usize = 3;

    pub const ALL: [JetCategory; 3] = [Self::Eq0Jets, Self::Geq1Jets, Self::Vbf];

    pub const fn idx(self) -> usize {
        self as usize
    }
}
