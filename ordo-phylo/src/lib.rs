//! Distance-based trees for the ordo crates.
//!
//! - **Tree data structures** — arena tree with explicit weighted edges ([`tree`])
//! - **Tree construction** — Neighbor-Joining and UPGMA ([`construct`])
//! - **Drawing** — angular, phylogram and cladogram coordinates ([`drawing`])

pub mod construct;
pub mod drawing;
pub mod tree;

pub use construct::{neighbor_joining, neighbor_joining_with_progress, upgma, upgma_with_progress};
pub use drawing::{tree_layout, LayoutStyle, NodeCoord, Segment, TreeLayout};
pub use tree::{Edge, EdgeId, Node, NodeId, Orientation, PhyloTree};
