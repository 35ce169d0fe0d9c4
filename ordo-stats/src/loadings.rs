//! Biplot and triplot loading vectors.
//!
//! A loading vector places an external category (a taxon, a functional class)
//! in ordination space according to how its per-sample counts co-vary with
//! the standardized PCoA axes.

use std::collections::BTreeMap;

use ordo_core::{OrdoError, Result};

use crate::linalg;
use crate::pcoa::{PcoaConfig, PcoaResult};

/// A named direction in ordination space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadingVector {
    /// Category name.
    pub name: String,
    /// One component per requested axis.
    pub vector: Vec<f64>,
}

impl LoadingVector {
    /// Squared Euclidean length, the ranking key.
    pub fn squared_length(&self) -> f64 {
        self.vector.iter().map(|v| v * v).sum()
    }
}

/// Loading vectors over the first two axes.
pub fn biplot(
    result: &PcoaResult,
    class_counts: &BTreeMap<String, Vec<f64>>,
    config: &PcoaConfig,
) -> Result<Vec<LoadingVector>> {
    loading_vectors(result, class_counts, 2, config)
}

/// Loading vectors over the first three axes.
pub fn triplot(
    result: &PcoaResult,
    class_counts: &BTreeMap<String, Vec<f64>>,
    config: &PcoaConfig,
) -> Result<Vec<LoadingVector>> {
    loading_vectors(result, class_counts, 3, config)
}

/// Loading vectors of every category over the first `n_axes` axes.
///
/// `class_counts` maps a category name to its counts, one per sample in
/// [`PcoaResult::samples`] order. The coordinates of the first `n_axes` axes
/// (zero columns past K) are centered and scaled, their bias-corrected
/// cross-covariance with the counts is divided by `√(λ/(n−1))` per axis and
/// multiplied by `config.loading_scale`. Axes without a positive eigenvalue
/// contribute 0.
///
/// The result is sorted by decreasing squared length, ties broken by name.
///
/// # Errors
///
/// Returns an error if `n_axes` is 0, there are fewer than 2 samples, or a
/// count vector's length differs from the number of samples.
pub fn loading_vectors(
    result: &PcoaResult,
    class_counts: &BTreeMap<String, Vec<f64>>,
    n_axes: usize,
    config: &PcoaConfig,
) -> Result<Vec<LoadingVector>> {
    let n = result.samples().len();
    if n_axes == 0 {
        return Err(OrdoError::InvalidInput(
            "loading vectors: n_axes must be > 0".into(),
        ));
    }
    if n < 2 {
        return Err(OrdoError::InvalidInput(
            "loading vectors: at least 2 samples required".into(),
        ));
    }
    for (name, counts) in class_counts {
        if counts.len() != n {
            return Err(OrdoError::InvalidInput(format!(
                "loading vectors: '{}' has {} counts, expected {}",
                name,
                counts.len(),
                n
            )));
        }
    }
    if class_counts.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<&String> = class_counts.keys().collect();
    let m: Vec<Vec<f64>> = (0..n)
        .map(|s| class_counts.values().map(|c| c[s]).collect())
        .collect();

    let k = result.number_of_positive_eigenvalues();
    let axes: Vec<Vec<f64>> = result
        .coordinate_matrix()
        .iter()
        .map(|row| {
            (0..n_axes)
                .map(|a| if a < k { row[a] } else { 0.0 })
                .collect()
        })
        .collect();
    let z = linalg::center_and_scale_columns(&axes);
    let cov = linalg::covariance(&m, &z, true)?;

    let inv_sd: Vec<f64> = (0..n_axes)
        .map(|a| match result.eigenvalues().get(a) {
            Some(&ev) if ev > 0.0 => 1.0 / (ev / (n - 1) as f64).sqrt(),
            _ => 0.0,
        })
        .collect();

    let mut vectors: Vec<LoadingVector> = names
        .into_iter()
        .zip(cov)
        .map(|(name, row)| LoadingVector {
            name: name.clone(),
            vector: row
                .iter()
                .zip(&inv_sd)
                .map(|(c, s)| c * s * config.loading_scale)
                .collect(),
        })
        .collect();

    vectors.sort_by(|a, b| {
        b.squared_length()
            .total_cmp(&a.squared_length())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(vectors)
}
