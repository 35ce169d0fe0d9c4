//! Tree drawing coordinates for visualization.
//!
//! Computes 2D layout coordinates in three styles: an angular layout for
//! unrooted trees and the rectangular phylogram and cladogram for rooted ones.

use std::f64::consts::PI;

use ordo_core::{OrdoError, Result};

use crate::tree::{NodeId, Orientation, PhyloTree};

/// Coordinates of a single node in the layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeCoord {
    /// Node index in the tree.
    pub node_id: NodeId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// A line segment between two laid-out nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Parent side.
    pub from: NodeId,
    /// Child side.
    pub to: NodeId,
}

/// Complete layout result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeLayout {
    /// Node coordinates, indexed by node id.
    pub coords: Vec<NodeCoord>,
    /// One segment per tree edge, parent to child.
    pub edges: Vec<Segment>,
}

impl TreeLayout {
    /// `(x, y)` of `node`.
    pub fn coord(&self, node: NodeId) -> Option<(f64, f64)> {
        self.coords.get(node).map(|c| (c.x, c.y))
    }
}

/// Layout style for tree drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutStyle {
    /// Leaves spread over a half-circle; edges drawn to scale along the
    /// mid-angle of the leaves they lead to.
    Angular,
    /// Rectangular, x = branch-length distance from the root.
    Phylogram,
    /// Rectangular, leaves at x = 0 and each parent one unit left of its
    /// leftmost child.
    Cladogram,
}

/// Compute a 2D layout for a tree.
///
/// The layout starts from the root of a rooted tree, otherwise from the last
/// node created (the final join of Neighbor-Joining).
pub fn tree_layout(tree: &PhyloTree, style: LayoutStyle) -> Result<TreeLayout> {
    if tree.node_count() == 0 {
        return Err(OrdoError::InvalidInput("empty tree".into()));
    }
    let start = tree.root().unwrap_or(tree.node_count() - 1);
    let view = tree.orient(start)?;
    if view.preorder.len() != tree.node_count() {
        return Err(OrdoError::InvalidInput("tree is not connected".into()));
    }

    let (x, y) = match style {
        LayoutStyle::Angular => angular(&view),
        LayoutStyle::Phylogram => rectangular(&view, true),
        LayoutStyle::Cladogram => rectangular(&view, false),
    };

    let coords = (0..tree.node_count())
        .map(|id| NodeCoord {
            node_id: id,
            x: x[id],
            y: y[id],
        })
        .collect();
    let edges = view
        .preorder
        .iter()
        .filter_map(|&id| view.parent[id].map(|p| Segment { from: p, to: id }))
        .collect();

    Ok(TreeLayout { coords, edges })
}

/// Tips (nodes without children) numbered in pre-order.
fn tip_slots(view: &Orientation) -> (Vec<usize>, usize) {
    let mut slot = vec![0; view.parent.len()];
    let mut count = 0;
    for &id in &view.preorder {
        if view.is_tip(id) {
            slot[id] = count;
            count += 1;
        }
    }
    (slot, count)
}

fn angular(view: &Orientation) -> (Vec<f64>, Vec<f64>) {
    let n = view.parent.len();
    let (slot, n_tips) = tip_slots(view);

    // first and last tip slot below each node
    let mut range = vec![(0usize, 0usize); n];
    for id in view.postorder() {
        range[id] = match (view.children[id].first(), view.children[id].last()) {
            (Some(&first), Some(&last)) => (range[first].0, range[last].1),
            _ => (slot[id], slot[id]),
        };
    }

    let angle_of = |s: f64| {
        if n_tips > 1 {
            PI * s / (n_tips - 1) as f64
        } else {
            PI / 2.0
        }
    };

    let mut x = vec![0.0; n];
    let mut y = vec![0.0; n];
    for &id in &view.preorder {
        if let Some(p) = view.parent[id] {
            let (lo, hi) = range[id];
            let angle = angle_of((lo + hi) as f64 / 2.0);
            let w = view.parent_weight[id];
            x[id] = x[p] + w * angle.cos();
            y[id] = y[p] + w * angle.sin();
        }
    }
    (x, y)
}

fn rectangular(view: &Orientation, to_scale: bool) -> (Vec<f64>, Vec<f64>) {
    let n = view.parent.len();
    let (slot, _) = tip_slots(view);

    let mut y = vec![0.0; n];
    let mut x = vec![0.0; n];
    for id in view.postorder() {
        let children = &view.children[id];
        if children.is_empty() {
            y[id] = slot[id] as f64;
        } else {
            y[id] = children.iter().map(|&c| y[c]).sum::<f64>() / children.len() as f64;
            if !to_scale {
                x[id] = children.iter().map(|&c| x[c]).fold(f64::INFINITY, f64::min) - 1.0;
            }
        }
    }

    if to_scale {
        for &id in &view.preorder {
            if let Some(p) = view.parent[id] {
                x[id] = x[p] + view.parent_weight[id];
            }
        }
    }
    (x, y)
}
