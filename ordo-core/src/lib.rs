//! Shared primitives for the ordo ordination and clustering crates.
//!
//! `ordo-core` holds the types every algorithm crate consumes:
//!
//! - **Error types** — [`OrdoError`] and [`Result`]
//! - **Taxa** — [`Taxa`], the 1-based id ↔ label set naming matrix rows
//! - **Distances** — [`Distances`], the symmetric sample dissimilarity matrix
//! - **Progress** — [`ProgressListener`] for cooperative cancellation
//! - **Traits** — [`Summarizable`] one-line summaries

pub mod distances;
pub mod error;
pub mod progress;
pub mod taxa;
pub mod traits;

pub use distances::Distances;
pub use error::{OrdoError, Result};
pub use progress::{CancelFlag, ProgressListener, Silent};
pub use taxa::Taxa;
pub use traits::Summarizable;
