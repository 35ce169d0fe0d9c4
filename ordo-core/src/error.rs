//! Structured error types for the ordo crates.

use thiserror::Error;

/// Unified error type for all ordo operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrdoError {
    /// Invalid input (non-square matrix, taxa/matrix size mismatch, too few points)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Numerically degenerate input (singular system, no ellipse solution)
    #[error("degenerate input: {0}")]
    Degenerate(String),

    /// The computation was canceled through its progress listener
    #[error("canceled")]
    Canceled,

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl OrdoError {
    /// True for [`OrdoError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, OrdoError::Canceled)
    }
}

/// Convenience alias used throughout the ordo crates.
pub type Result<T> = std::result::Result<T, OrdoError>;
