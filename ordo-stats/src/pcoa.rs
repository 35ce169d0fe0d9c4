//! Principal Coordinates Analysis (classical metric multidimensional scaling).
//!
//! The pipeline runs in separate stages, each returning a fresh value:
//!
//! 1. Gower double centering of the squared distances ([`linalg::double_center_squared`])
//! 2. Symmetric eigen-decomposition ([`eigen::symmetric_eigen`])
//! 3. Eigenvalues at or below the positive threshold are zeroed ([`classify_eigenvalues`])
//! 4. Every eigenvector column is scaled by `√λ` ([`scale_eigenvectors`])
//! 5. Axes are ranked by decreasing absolute eigenvalue ([`linalg::sort_by_eigenvalue`])
//! 6. The first K ranked axes are kept, with percent of variance explained
//! 7. Each sample's coordinates are its scaled-eigenvector row on those axes

use std::collections::HashMap;

use log::debug;
use ordo_core::{Distances, OrdoError, ProgressListener, Result, Silent, Summarizable, Taxa};

use crate::{eigen, linalg};

/// Tunable constants for PCoA and its loading vectors.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcoaConfig {
    /// Eigenvalues strictly above this are "positive" and become axes.
    pub positive_threshold: f64,
    /// Display scaling applied to biplot/triplot loading vectors.
    pub loading_scale: f64,
    /// Upper bound on Jacobi sweeps.
    pub max_sweeps: usize,
}

impl Default for PcoaConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 1e-9,
            loading_scale: 1e-5,
            max_sweeps: 100,
        }
    }
}

/// Result of Principal Coordinates Analysis.
///
/// Produced in one piece by [`classic_mds`] and immutable afterwards.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PcoaResult {
    samples: Vec<String>,
    sample_index: HashMap<String, usize>,
    /// Shape: `n_samples × K`.
    coordinates: Vec<Vec<f64>>,
    /// K positive eigenvalues, decreasing.
    eigenvalues: Vec<f64>,
    percent_explained: Option<Vec<f64>>,
    rank: usize,
    n_negative_eigenvalues: usize,
}

impl PcoaResult {
    /// Number of positive eigenvalues, K. Every coordinate vector has this length.
    pub fn number_of_positive_eigenvalues(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Dimension of the decomposed matrix (the number of samples).
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The K positive eigenvalues, by decreasing magnitude.
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    /// Percent of the positive variance carried by axis `pc` (0-based).
    ///
    /// `None` if `pc >= K` or if the eigenvalue sum was not positive.
    pub fn percent_explained(&self, pc: usize) -> Option<f64> {
        self.percent_explained.as_ref()?.get(pc).copied()
    }

    /// Number of raw eigenvalues below `-threshold` (non-Euclidean input).
    pub fn n_negative_eigenvalues(&self) -> usize {
        self.n_negative_eigenvalues
    }

    /// Sample names in taxa id order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Coordinate vector of `sample` (length K).
    pub fn coordinates(&self, sample: &str) -> Option<&[f64]> {
        self.sample_index
            .get(sample)
            .map(|&i| self.coordinates[i].as_slice())
    }

    /// All coordinate vectors, in [`samples`](Self::samples) order.
    pub fn coordinate_matrix(&self) -> &[Vec<f64>] {
        &self.coordinates
    }

    /// Three axes of `sample`'s coordinates; any axis index `>= K` reads as 0.
    pub fn projection(&self, i: usize, j: usize, k: usize, sample: &str) -> Option<[f64; 3]> {
        let coords = self.coordinates(sample)?;
        let axis = |a: usize| coords.get(a).copied().unwrap_or(0.0);
        Some([axis(i), axis(j), axis(k)])
    }
}

impl Summarizable for PcoaResult {
    fn summary(&self) -> String {
        format!(
            "PcoaResult: {} samples, {} positive axes ({} negative eigenvalues)",
            self.samples.len(),
            self.eigenvalues.len(),
            self.n_negative_eigenvalues
        )
    }
}

/// PCoA with default settings and no cancellation.
pub fn pcoa(taxa: &Taxa, distances: &Distances) -> Result<PcoaResult> {
    classic_mds(taxa, distances, &PcoaConfig::default(), &Silent)
}

/// Classical multidimensional scaling of `distances`, rows named by `taxa`.
///
/// The listener is polled once per sample in every per-sample loop
/// (centering, scaling, coordinate extraction) and once per eigen sweep.
///
/// # Errors
///
/// Returns an error if the taxa don't match the matrix or there are fewer
/// than 2 samples, [`OrdoError::Degenerate`] if the eigen solver does not
/// converge within `config.max_sweeps`, and [`OrdoError::Canceled`] if the
/// listener cancels.
pub fn classic_mds(
    taxa: &Taxa,
    distances: &Distances,
    config: &PcoaConfig,
    progress: &dyn ProgressListener,
) -> Result<PcoaResult> {
    distances.check_taxa(taxa)?;
    let n = distances.ntax();
    if n < 2 {
        return Err(OrdoError::InvalidInput(
            "pcoa: at least 2 samples required".into(),
        ));
    }

    let gower = linalg::double_center_squared_with_progress(&distances.to_rows(), progress)?;

    let decomposition = eigen::symmetric_eigen(&gower, config.max_sweeps, progress)?;

    let n_negative = decomposition
        .values
        .iter()
        .filter(|&&v| v < -config.positive_threshold)
        .count();
    let (zeroed, k) = classify_eigenvalues(&decomposition.values, config.positive_threshold);
    let scaled = scale_eigenvectors(&decomposition.vectors, &zeroed, progress)?;
    let order = linalg::sort_by_eigenvalue(&zeroed);
    let selected = &order[..k];

    let eigenvalues: Vec<f64> = selected.iter().map(|&c| zeroed[c]).collect();
    let total: f64 = eigenvalues.iter().sum();
    let percent_explained = if total > 0.0 {
        Some(eigenvalues.iter().map(|&e| 100.0 * e / total).collect())
    } else {
        None
    };

    let mut coordinates = Vec::with_capacity(n);
    for (i, row) in scaled.iter().enumerate() {
        progress.step(i, n)?;
        coordinates.push(selected.iter().map(|&c| row[c]).collect::<Vec<f64>>());
    }

    let samples = taxa.labels();
    let sample_index = samples
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), i))
        .collect();

    debug!(
        "pcoa: {} samples (max distance {}), {} positive axes, {} negative eigenvalues",
        n,
        distances.max_value(),
        k,
        n_negative
    );

    Ok(PcoaResult {
        samples,
        sample_index,
        coordinates,
        eigenvalues,
        percent_explained,
        rank: n,
        n_negative_eigenvalues: n_negative,
    })
}

/// Zero every eigenvalue at or below `threshold` and count the rest.
pub fn classify_eigenvalues(values: &[f64], threshold: f64) -> (Vec<f64>, usize) {
    let zeroed: Vec<f64> = values
        .iter()
        .map(|&v| if v > threshold { v } else { 0.0 })
        .collect();
    let k = zeroed.iter().filter(|&&v| v > 0.0).count();
    (zeroed, k)
}

/// Scale eigenvector column `j` by `√eigenvalues[j]`.
///
/// `eigenvalues` must already be non-negative (see [`classify_eigenvalues`]).
pub fn scale_eigenvectors(
    vectors: &[Vec<f64>],
    eigenvalues: &[f64],
    progress: &dyn ProgressListener,
) -> Result<Vec<Vec<f64>>> {
    let roots: Vec<f64> = eigenvalues.iter().map(|v| v.max(0.0).sqrt()).collect();
    let n = vectors.len();
    let mut scaled = Vec::with_capacity(n);
    for (i, row) in vectors.iter().enumerate() {
        progress.step(i, n)?;
        scaled.push(row.iter().zip(&roots).map(|(x, r)| x * r).collect());
    }
    Ok(scaled)
}
