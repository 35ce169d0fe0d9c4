//! Tree data structures for distance-based clustering.
//!
//! Uses arena-style storage: nodes and edges live in flat `Vec`s and are
//! referenced by `usize` ids. Edges are stored explicitly because
//! Neighbor-Joining produces an unrooted tree; a rooted tree (UPGMA) simply
//! records which node is its root.

use ordo_core::{OrdoError, Result, Summarizable};

/// Index into the tree's node arena.
pub type NodeId = usize;

/// Index into the tree's edge arena.
pub type EdgeId = usize;

/// A node of a tree. Leaves carry the taxon id they stand for.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Index of this node in the arena.
    pub id: NodeId,
    /// Taxon label (leaves only).
    pub label: Option<String>,
    /// 1-based taxon id (leaves only).
    pub taxon: Option<usize>,
    edges: Vec<EdgeId>,
}

impl Node {
    /// True if this node stands for a taxon.
    pub fn is_leaf(&self) -> bool {
        self.taxon.is_some()
    }

    /// Incident edges in insertion order.
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Number of incident edges.
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// A weighted edge. Weights are branch lengths and never negative.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Index of this edge in the arena.
    pub id: EdgeId,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Branch length.
    pub weight: f64,
}

impl Edge {
    /// The endpoint that is not `v`.
    pub fn opposite(&self, v: NodeId) -> NodeId {
        if self.source == v {
            self.target
        } else {
            self.source
        }
    }
}

/// A tree over taxa with weighted edges.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhyloTree {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    root: Option<NodeId>,
    clamped_edges: usize,
}

/// The tree seen from one start node: parent links and ordered children.
#[derive(Debug, Clone)]
pub struct Orientation {
    /// Node ids in pre-order (parent before children).
    pub preorder: Vec<NodeId>,
    /// Parent of each node (`None` for the start node and unreachable nodes).
    pub parent: Vec<Option<NodeId>>,
    /// Weight of the edge to the parent (0 for the start node).
    pub parent_weight: Vec<f64>,
    /// Children of each node, in edge insertion order.
    pub children: Vec<Vec<NodeId>>,
}

impl Orientation {
    /// Post-order (children before parent) sequence.
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.preorder.len());
        let mut stack = vec![(self.preorder[0], false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                result.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.children[id].iter().rev() {
                stack.push((child, false));
            }
        }
        result
    }

    /// True if `id` has no children from this point of view.
    pub fn is_tip(&self, id: NodeId) -> bool {
        self.children[id].is_empty()
    }
}

impl PhyloTree {
    /// An empty, unrooted tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id.
    pub fn add_node(&mut self, label: Option<String>, taxon: Option<usize>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            label,
            taxon,
            edges: Vec::new(),
        });
        id
    }

    /// Connect `source` to `target` with a non-negative weight.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, weight: f64) -> Result<EdgeId> {
        let n = self.nodes.len();
        if source >= n || target >= n {
            return Err(OrdoError::InvalidInput(format!(
                "edge ({}, {}) out of range ({})",
                source, target, n
            )));
        }
        if source == target {
            return Err(OrdoError::InvalidInput(format!(
                "self-loop at node {}",
                source
            )));
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(OrdoError::InvalidInput(format!(
                "edge weight must be finite and non-negative, got {}",
                weight
            )));
        }
        let id = self.edges.len();
        self.edges.push(Edge {
            id,
            source,
            target,
            weight,
        });
        self.nodes[source].edges.push(id);
        self.nodes[target].edges.push(id);
        Ok(id)
    }

    /// Mark `root` as the root, making the tree rooted.
    pub fn set_root(&mut self, root: NodeId) -> Result<()> {
        if root >= self.nodes.len() {
            return Err(OrdoError::InvalidInput(format!(
                "root index {} out of range ({})",
                root,
                self.nodes.len()
            )));
        }
        self.root = Some(root);
        Ok(())
    }

    /// The root, for rooted trees.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// True if a root has been set.
    pub fn is_rooted(&self) -> bool {
        self.root.is_some()
    }

    /// Access a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Access an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// All nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Leaf node ids, in node order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.id)
            .collect()
    }

    /// Number of leaf nodes.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// The leaf labelled `label`.
    pub fn leaf_by_label(&self, label: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.is_leaf() && n.label.as_deref() == Some(label))
            .map(|n| n.id)
    }

    /// `(neighbor, weight)` pairs of `v`, in edge insertion order.
    pub fn neighbors(&self, v: NodeId) -> Vec<(NodeId, f64)> {
        self.nodes[v]
            .edges
            .iter()
            .map(|&e| (self.edges[e].opposite(v), self.edges[e].weight))
            .collect()
    }

    /// Number of branch lengths that were negative and replaced by zero
    /// during construction.
    pub fn clamped_edges(&self) -> usize {
        self.clamped_edges
    }

    pub(crate) fn set_clamped_edges(&mut self, count: usize) {
        self.clamped_edges = count;
    }

    /// Orient the tree away from `start`.
    pub fn orient(&self, start: NodeId) -> Result<Orientation> {
        let n = self.nodes.len();
        if start >= n {
            return Err(OrdoError::InvalidInput(format!(
                "start node {} out of range ({})",
                start, n
            )));
        }
        let mut parent = vec![None; n];
        let mut parent_weight = vec![0.0; n];
        let mut children = vec![Vec::new(); n];
        let mut visited = vec![false; n];
        let mut preorder = Vec::with_capacity(n);

        let mut stack = vec![start];
        visited[start] = true;
        while let Some(v) = stack.pop() {
            preorder.push(v);
            let mut kids = Vec::new();
            for &e in &self.nodes[v].edges {
                let edge = &self.edges[e];
                let w = edge.opposite(v);
                if !visited[w] {
                    visited[w] = true;
                    parent[w] = Some(v);
                    parent_weight[w] = edge.weight;
                    kids.push(w);
                }
            }
            // push in reverse so the first child is visited first
            for &k in kids.iter().rev() {
                stack.push(k);
            }
            children[v] = kids;
        }

        Ok(Orientation {
            preorder,
            parent,
            parent_weight,
            children,
        })
    }

    /// Sum of edge weights on the path between `a` and `b`.
    pub fn path_length(&self, a: NodeId, b: NodeId) -> Result<f64> {
        let view = self.orient(a)?;
        if b >= self.nodes.len() {
            return Err(OrdoError::InvalidInput("node id out of range".into()));
        }
        let mut total = 0.0;
        let mut cur = b;
        while cur != a {
            total += view.parent_weight[cur];
            cur = view.parent[cur].ok_or_else(|| {
                OrdoError::InvalidInput(format!("nodes {} and {} are not connected", a, b))
            })?;
        }
        Ok(total)
    }

    /// Most recent common ancestor of two nodes in a rooted tree.
    pub fn mrca(&self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let root = self.require_root()?;
        if a >= self.nodes.len() || b >= self.nodes.len() {
            return Err(OrdoError::InvalidInput("node id out of range".into()));
        }
        let view = self.orient(root)?;
        let mut ancestors_a = Vec::new();
        let mut cur = Some(a);
        while let Some(v) = cur {
            ancestors_a.push(v);
            cur = view.parent[v];
        }
        let mut cur = Some(b);
        while let Some(v) = cur {
            if ancestors_a.contains(&v) {
                return Ok(v);
            }
            cur = view.parent[v];
        }
        Ok(root)
    }

    /// Longest distance from `v` down to a leaf below it, in a rooted tree.
    pub fn height(&self, v: NodeId) -> Result<f64> {
        let root = self.require_root()?;
        if v >= self.nodes.len() {
            return Err(OrdoError::InvalidInput("node id out of range".into()));
        }
        let view = self.orient(root)?;
        let mut heights = vec![0.0f64; self.nodes.len()];
        for id in view.postorder() {
            heights[id] = view.children[id]
                .iter()
                .map(|&c| heights[c] + view.parent_weight[c])
                .fold(0.0, f64::max);
        }
        Ok(heights[v])
    }

    /// Sum of all edge weights.
    pub fn total_length(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    fn require_root(&self) -> Result<NodeId> {
        self.root
            .ok_or_else(|| OrdoError::InvalidInput("tree is unrooted".into()))
    }
}

impl Summarizable for PhyloTree {
    fn summary(&self) -> String {
        let leaves = self.leaf_count();
        format!(
            "PhyloTree: {} nodes ({} leaves, {} internal), {} edges, {}",
            self.node_count(),
            leaves,
            self.node_count() - leaves,
            self.edge_count(),
            if self.is_rooted() { "rooted" } else { "unrooted" }
        )
    }
}
