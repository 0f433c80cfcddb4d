use itertools::izip;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A weight with its statistical uncertainty
#[derive(Deserialize, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Weight {
    pub value: N64,
    pub uncertainty: N64,
}

impl Weight {
    pub fn new(value: N64, uncertainty: N64) -> Self {
        Self { value, uncertainty }
    }

    /// The multiplicative unit, 1 ± 0
    pub fn unit() -> Self {
        Self::new(n64(1.), n64(0.))
    }

    /// Product of two independent weights
    ///
    /// Uncertainties are combined in quadrature on the relative
    /// uncertainties. A vanishing central value in either factor short
    /// circuits to 0 ± 0, so no division by zero can occur.
    pub fn product(self, other: Weight) -> Weight {
        if self.value == 0. || other.value == 0. {
            return Weight::new(n64(0.), n64(0.));
        }
        let value = self.value * other.value;
        let rel1 = self.uncertainty / self.value;
        let rel2 = other.uncertainty / other.value;
        let uncertainty = value.abs() * (rel1 * rel1 + rel2 * rel2).sqrt();
        Weight::new(value, uncertainty)
    }
}

/// Raw content of a one-dimensional weight table
///
/// Each entry of `edges` is the lower edge of a bin; the last bin
/// extends to infinity. This is the on-disk representation, validated
/// into a [WeightTable] before use.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct TableData {
    pub edges: Vec<N64>,
    pub values: Vec<N64>,
    pub errors: Vec<N64>,
}

/// Raw content of a two-dimensional weight table
///
/// The outer axis follows the same lower-edge convention, with one
/// inner table per outer bin.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct TableData2d {
    pub outer_edges: Vec<N64>,
    pub rows: Vec<TableData>,
}

/// An immutable piecewise-constant weight lookup over one axis
///
/// Lookups find the greatest bin lower edge not exceeding the query
/// value. Queries below the lowest edge are an error: they signal that
/// the auxiliary weight tables were derived with a binning that does
/// not cover the data, and silently defaulting to unit weight would
/// corrupt the normalization invisibly.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WeightTable {
    name: String,
    edges: Vec<N64>,
    weights: Vec<Weight>,
}

impl WeightTable {
    pub fn from_data(name: &str, data: TableData) -> Result<Self, TableError> {
        let TableData {
            edges,
            values,
            errors,
        } = data;
        validate_edges(name, &edges)?;
        if values.len() != edges.len() || errors.len() != edges.len() {
            return Err(TableError::LengthMismatch {
                name: name.to_owned(),
                edges: edges.len(),
                values: values.len(),
                errors: errors.len(),
            });
        }
        if let Some(err) = errors.iter().find(|e| **e < 0.) {
            return Err(TableError::NegativeUncertainty {
                name: name.to_owned(),
                uncertainty: f64::from(*err),
            });
        }
        let weights = izip!(values, errors)
            .map(|(value, uncertainty)| Weight::new(value, uncertainty))
            .collect();
        Ok(Self {
            name: name.to_owned(),
            edges,
            weights,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nbins(&self) -> usize {
        self.edges.len()
    }

    /// Look up the weight for the bin containing `x`
    pub fn lookup(&self, x: N64) -> Result<Weight, OutOfRange> {
        let idx = greatest_edge_not_above(&self.edges, x).ok_or(OutOfRange {
            table: self.name.clone(),
            value: f64::from(x),
            lowest: f64::from(self.edges[0]),
        })?;
        Ok(self.weights[idx])
    }
}

/// An immutable piecewise-constant weight lookup over two axes
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WeightTable2d {
    name: String,
    outer_edges: Vec<N64>,
    rows: Vec<WeightTable>,
}

impl WeightTable2d {
    pub fn from_data(name: &str, data: TableData2d) -> Result<Self, TableError> {
        let TableData2d { outer_edges, rows } = data;
        validate_edges(name, &outer_edges)?;
        if rows.len() != outer_edges.len() {
            return Err(TableError::RowMismatch {
                name: name.to_owned(),
                edges: outer_edges.len(),
                rows: rows.len(),
            });
        }
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(n, row)| WeightTable::from_data(&format!("{name}[{n}]"), row))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            name: name.to_owned(),
            outer_edges,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the weight for the bin containing (`x`, `y`)
    ///
    /// The greatest-edge semantics apply independently on each axis.
    pub fn lookup(&self, x: N64, y: N64) -> Result<Weight, OutOfRange> {
        let idx = greatest_edge_not_above(&self.outer_edges, x).ok_or(OutOfRange {
            table: self.name.clone(),
            value: f64::from(x),
            lowest: f64::from(self.outer_edges[0]),
        })?;
        self.rows[idx].lookup(y)
    }
}

fn validate_edges(name: &str, edges: &[N64]) -> Result<(), TableError> {
    if edges.is_empty() {
        return Err(TableError::Empty {
            name: name.to_owned(),
        });
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TableError::UnsortedEdges {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Index of the greatest edge less than or equal to `x`
///
/// Returns `None` if `x` lies below the first edge.
fn greatest_edge_not_above(edges: &[N64], x: N64) -> Option<usize> {
    match edges.binary_search(&x) {
        Ok(idx) => Some(idx),
        Err(0) => None,
        Err(idx) => Some(idx - 1),
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Weight table `{name}` has no bins")]
    Empty { name: String },
    #[error("Bin edges of weight table `{name}` are not strictly increasing")]
    UnsortedEdges { name: String },
    #[error(
        "Weight table `{name}` has {edges} bin edges, \
         but {values} values and {errors} errors"
    )]
    LengthMismatch {
        name: String,
        edges: usize,
        values: usize,
        errors: usize,
    },
    #[error("Weight table `{name}` has {edges} outer bin edges, but {rows} rows")]
    RowMismatch {
        name: String,
        edges: usize,
        rows: usize,
    },
    #[error("Weight table `{name}` has a negative uncertainty {uncertainty}")]
    NegativeUncertainty { name: String, uncertainty: f64 },
}

#[derive(Debug, Error)]
#[error(
    "Value {value} lies below the lowest bin edge {lowest} \
     of weight table `{table}`"
)]
pub struct OutOfRange {
    pub table: String,
    pub value: f64,
    pub lowest: f64,
}
