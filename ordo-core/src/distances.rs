//! Symmetric pairwise dissimilarity matrices.

use crate::error::{OrdoError, Result};
use crate::taxa::Taxa;
use crate::traits::Summarizable;

/// A symmetric `n × n` matrix of pairwise dissimilarities, indexed `1..=n`.
///
/// The single setter writes both `(i, j)` and `(j, i)`, so `get(i, j) ==
/// get(j, i)` always holds. The diagonal is zero unless explicitly set. No
/// triangle inequality is required.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Distances {
    n: usize,
    /// Row-major `n × n` storage, 0-based.
    values: Vec<f64>,
}

impl Distances {
    /// An all-zero matrix for `n` taxa.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; n * n],
        }
    }

    /// Build from 0-based dense rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows are not square or not symmetric.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(OrdoError::InvalidInput(format!(
                    "distance matrix must be square: row {} has length {}, expected {}",
                    i + 1,
                    row.len(),
                    n
                )));
            }
        }
        let mut d = Self::new(n);
        for i in 0..n {
            for j in i..n {
                let (a, b) = (rows[i][j], rows[j][i]);
                if (a - b).abs() > 1e-12 {
                    return Err(OrdoError::InvalidInput(format!(
                        "distance matrix must be symmetric: d({},{}) = {} but d({},{}) = {}",
                        i + 1,
                        j + 1,
                        a,
                        j + 1,
                        i + 1,
                        b
                    )));
                }
                d.set(i + 1, j + 1, a);
            }
        }
        Ok(d)
    }

    /// Number of taxa (matrix dimension).
    pub fn ntax(&self) -> usize {
        self.n
    }

    /// Distance between taxa `i` and `j` (1-based).
    ///
    /// # Panics
    ///
    /// Panics if either index is 0 or greater than [`ntax`](Self::ntax).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[self.offset(i, j)]
    }

    /// Set the distance between `i` and `j` (1-based), symmetrically.
    ///
    /// # Panics
    ///
    /// Panics if either index is 0 or greater than [`ntax`](Self::ntax).
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let ij = self.offset(i, j);
        let ji = self.offset(j, i);
        self.values[ij] = value;
        self.values[ji] = value;
    }

    /// A 0-based dense copy, `rows[i - 1][j - 1] == get(i, j)`.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.chunks(self.n.max(1)).take(self.n).map(|r| r.to_vec()).collect()
    }

    /// Largest entry (0 for an empty matrix).
    pub fn max_value(&self) -> f64 {
        self.values.iter().cloned().fold(0.0, f64::max)
    }

    /// Check that this matrix can be interpreted with `taxa`.
    ///
    /// The taxa count must equal the dimension, taxa ids must be exactly
    /// `1..=n`, and every entry must be finite.
    pub fn check_taxa(&self, taxa: &Taxa) -> Result<()> {
        if taxa.len() != self.n {
            return Err(OrdoError::InvalidInput(format!(
                "taxa count {} doesn't match distance matrix size {}",
                taxa.len(),
                self.n
            )));
        }
        if !taxa.is_dense() {
            return Err(OrdoError::InvalidInput(format!(
                "taxa ids must be 1..={} (max id is {})",
                taxa.len(),
                taxa.max_id()
            )));
        }
        if let Some(pos) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(OrdoError::InvalidInput(format!(
                "non-finite distance at ({},{})",
                pos / self.n + 1,
                pos % self.n + 1
            )));
        }
        Ok(())
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i >= 1 && i <= self.n && j >= 1 && j <= self.n,
            "distance index ({}, {}) out of range 1..={}",
            i,
            j,
            self.n
        );
        (i - 1) * self.n + (j - 1)
    }
}

impl Summarizable for Distances {
    fn summary(&self) -> String {
        format!("Distances: {}x{}", self.n, self.n)
    }
}
