//! Ordination of sample distance matrices for the ordo crates.
//!
//! - **PCoA** — classical multidimensional scaling ([`pcoa`])
//! - **Loading vectors** — biplot/triplot category arrows ([`loadings`])
//! - **Ellipses** — direct least-squares group ellipses ([`ellipse`])
//! - **Linear algebra** — dense matrix helpers and eigen solvers ([`linalg`], [`eigen`])

pub mod eigen;
pub mod ellipse;
pub mod linalg;
pub mod loadings;
pub mod pcoa;

pub use ellipse::{fit_ellipse, fit_group_ellipses, Ellipse};
pub use loadings::{biplot, loading_vectors, triplot, LoadingVector};
pub use pcoa::{classic_mds, pcoa, PcoaConfig, PcoaResult};
