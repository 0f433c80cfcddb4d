use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use strum::Display;
use thiserror::Error;

use crate::category::{JetCategory, LeptonCategory};
use crate::lineshape::{Lineshape, LineshapeData, LineshapeError, MassLineshapeSampler};
use crate::table::{TableData, TableData2d, TableError, WeightTable, WeightTable2d};

const NVTX_FILE: &str = "weight_nvtx.yml";
const PT_FILE: &str = "weight_pt.yml";
const MASS_FILE: &str = "lineshape_mass.yml";

/// The reweighting stages, in the order they are applied
///
/// The boson-pT table is derived from an already vertex-reweighted
/// sample, so the vertex-count stage must come first. Reordering the
/// stages silently changes the meaning of the result.
#[derive(Display, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Stage {
    #[strum(serialize = "vertex-count")]
    VertexCount,
    #[strum(serialize = "boson-pt")]
    BosonPt,
    #[strum(serialize = "mass-lineshape")]
    MassLineshape,
}

/// Collection of all weight tables needed for photon reweighting
///
/// Tables are loaded once from a base directory holding one file per
/// stage and are read-only afterwards. If the vertex-count file is
/// absent, reweighting as a whole is recorded as disabled and the later
/// stages are skipped without error.
#[derive(Debug)]
pub struct WeightTableStore {
    nvtx: [Option<WeightTable2d>; LeptonCategory::COUNT],
    pt: [[Option<WeightTable>; JetCategory::COUNT]; LeptonCategory::COUNT],
    sampler: MassLineshapeSampler,
    has_pt: bool,
    has_mass: bool,
}

impl WeightTableStore {
    /// An empty store with all stages disabled
    ///
    /// Tables can be added with the `insert_*` methods, for callers
    /// that obtain them from somewhere other than the conventional
    /// files read by [load](Self::load).
    pub fn empty() -> Self {
        Self {
            nvtx: Default::default(),
            pt: Default::default(),
            sampler: MassLineshapeSampler::new(),
            has_pt: false,
            has_mass: false,
        }
    }

    pub fn insert_nvtx(&mut self, cat: LeptonCategory, table: WeightTable2d) {
        self.nvtx[cat.idx()] = Some(table);
    }

    pub fn insert_pt(&mut self, lep: LeptonCategory, jet: JetCategory, table: WeightTable) {
        self.pt[lep.idx()][jet.idx()] = Some(table);
        self.has_pt = true;
    }

    pub fn insert_lineshape(&mut self, cat: LeptonCategory, shape: Lineshape) {
        self.sampler.insert(cat, shape);
        self.has_mass = true;
    }

    /// Load the weight tables found under `base_dir`
    ///
    /// File existence is probed exactly once per stage.
    pub fn load(base_dir: &Path) -> Result<Self, StoreError> {
        let mut store = Self::empty();

        let nvtx_path = base_dir.join(NVTX_FILE);
        if !nvtx_path.exists() {
            warn!(
                "Vertex-count weight table {nvtx_path:?} not found, \
                 photon reweighting is disabled"
            );
            return Ok(store);
        }
        info!("Vertex-count weights will be applied");
        let mut nvtx_data: HashMap<String, TableData2d> = read_yaml(&nvtx_path)?;
        for cat in LeptonCategory::DILEPTON {
            let data = take_table(&nvtx_path, &mut nvtx_data, &cat.to_string())?;
            let name = format!("{NVTX_FILE}:{cat}");
            store.nvtx[cat.idx()] = Some(WeightTable2d::from_data(&name, data)?);
        }

        let pt_path = base_dir.join(PT_FILE);
        if pt_path.exists() {
            info!("Boson-pT weights will be applied");
            let mut pt_data: HashMap<String, TableData> = read_yaml(&pt_path)?;
            for lep in LeptonCategory::DILEPTON {
                for jet in JetCategory::ALL {
                    let key = format!("{lep}_{jet}");
                    let data = take_table(&pt_path, &mut pt_data, &key)?;
                    let name = format!("{PT_FILE}:{key}");
                    store.pt[lep.idx()][jet.idx()] =
                        Some(WeightTable::from_data(&name, data)?);
                }
            }
            store.has_pt = true;
        } else {
            warn!("Boson-pT weight table {pt_path:?} not found, stage disabled");
        }

        let mass_path = base_dir.join(MASS_FILE);
        if mass_path.exists() {
            info!("Mass lineshape will be applied");
            let mut mass_data: HashMap<String, LineshapeData> = read_yaml(&mass_path)?;
            for cat in LeptonCategory::DILEPTON {
                let data = take_table(&mass_path, &mut mass_data, &cat.to_string())?;
                let name = format!("{MASS_FILE}:{cat}");
                store.sampler.insert(cat, Lineshape::from_data(&name, data)?);
            }
            store.has_mass = true;
        } else {
            warn!("Mass lineshape {mass_path:?} not found, stage disabled");
        }

        Ok(store)
    }

    /// Whether the given reweighting stage has its tables loaded
    pub fn has_stage(&self, stage: Stage) -> bool {
        match stage {
            Stage::VertexCount => self.nvtx.iter().any(|t| t.is_some()),
            Stage::BosonPt => self.has_pt,
            Stage::MassLineshape => self.has_mass,
        }
    }

    pub fn nvtx_table(&self, cat: LeptonCategory) -> Option<&WeightTable2d> {
        self.nvtx[cat.idx()].as_ref()
    }

    pub fn pt_table(&self, lep: LeptonCategory, jet: JetCategory) -> Option<&WeightTable> {
        self.pt[lep.idx()][jet.idx()].as_ref()
    }

    pub fn sampler(&self) -> &MassLineshapeSampler {
        &self.sampler
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!("Reading weight resource {path:?}");
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_yaml::from_reader(file).map_err(|source| StoreError::Yaml {
        path: path.to_owned(),
        source,
    })
}

fn take_table<T>(
    path: &Path,
    tables: &mut HashMap<String, T>,
    key: &str,
) -> Result<T, StoreError> {
    tables.remove(key).ok_or_else(|| StoreError::MissingTable {
        path: path.to_owned(),
        key: key.to_owned(),
    })
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read weight resource {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse weight resource {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Weight resource {path:?} has no table `{key}`")]
    MissingTable { path: PathBuf, key: String },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Lineshape(#[from] LineshapeError),
}
