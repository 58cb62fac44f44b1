//! Numeric dataset handed to pluggable change tests.
//!
//! The engine itself never computes on the data; it only threads a dataset
//! through to the statistical test behind the change oracle. The storage is
//! a dense row-by-column `f64` matrix with named columns, where the column
//! index doubles as the graph's [`VarId`].

use crate::core::VarId;
use ndarray::{Array2, ArrayView1};
use thiserror::Error;

/// Error raised when a dataset cannot be assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// The name list and the value matrix disagree on the column count.
    #[error("dataset has {names} column names but {cols} value columns")]
    ShapeMismatch {
        /// Number of column names supplied.
        names: usize,
        /// Number of columns in the value matrix.
        cols: usize,
    },
}

/// A named, column-indexed numeric dataset.
///
/// Rows are samples, columns are variables. Column order is significant:
/// it defines variable identity ([`VarId`] equals column index) and, by
/// convention, the environment indicator is the last column when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    /// Assembles a dataset from column names and a value matrix.
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self, DatasetError> {
        if names.len() != values.ncols() {
            return Err(DatasetError::ShapeMismatch {
                names: names.len(),
                cols: values.ncols(),
            });
        }
        Ok(Self { names, values })
    }

    /// Number of samples.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of variables.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// True when there is nothing to analyze: no rows or no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0 || self.values.ncols() == 0
    }

    /// All column names in column order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the given variable, if in range.
    #[inline]
    pub fn name(&self, id: VarId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// The full value matrix.
    #[inline]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// View of one variable's column, if in range.
    pub fn column(&self, id: VarId) -> Option<ArrayView1<'_, f64>> {
        if id.index() < self.values.ncols() {
            Some(self.values.column(id.index()))
        } else {
            None
        }
    }

    /// Identifier of the last column, if any.
    ///
    /// By convention this is the environment indicator when the caller says
    /// so; the dataset itself attaches no meaning to it.
    pub fn last_column(&self) -> Option<VarId> {
        match self.values.ncols() {
            0 => None,
            n => Some(VarId::new((n - 1) as u32)),
        }
    }
}
