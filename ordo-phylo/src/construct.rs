//! Distance-based tree construction algorithms.
//!
//! Provides Neighbor-Joining (unrooted, additive) and UPGMA (rooted,
//! ultrametric) trees built from a [`Distances`] matrix over a [`Taxa`] set.
//! Negative branch lengths are replaced by zero; the number of replacements
//! is kept on the tree as [`PhyloTree::clamped_edges`].

use log::{debug, warn};
use ordo_core::{Distances, OrdoError, ProgressListener, Result, Silent, Taxa};

use crate::tree::{NodeId, PhyloTree};

/// Build an unrooted tree using Neighbor-Joining.
pub fn neighbor_joining(taxa: &Taxa, distances: &Distances) -> Result<PhyloTree> {
    neighbor_joining_with_progress(taxa, distances, &Silent)
}

/// Neighbor-Joining, polling `progress` once per join.
///
/// Each join picks the active pair minimizing
/// `h[i][j] − (b[i] + b[j]) / (m − 2)`, where `b` are row sums over the `m`
/// active taxa; the first minimum in row-major scan order wins. The two
/// joined subtrees hang off a new internal node and the last two active
/// clusters are connected directly.
///
/// # Errors
///
/// Returns an error if fewer than two taxa are given, the taxa and matrix
/// disagree, or `progress` requests cancellation.
pub fn neighbor_joining_with_progress(
    taxa: &Taxa,
    distances: &Distances,
    progress: &dyn ProgressListener,
) -> Result<PhyloTree> {
    let n = validate_inputs(taxa, distances)?;
    let mut h = distances.to_rows();
    let mut tree = PhyloTree::new();
    let mut slot_node = add_leaves(&mut tree, taxa, n);
    let mut active = vec![true; n];
    let mut n_active = n;
    let mut clamped = 0;

    while n_active > 2 {
        progress.step(n - n_active, n - 2)?;

        let b: Vec<f64> = (0..n)
            .map(|i| {
                if active[i] {
                    (0..n).filter(|&k| active[k]).map(|k| h[i][k]).sum()
                } else {
                    0.0
                }
            })
            .collect();
        let denom = (n_active - 2) as f64;

        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in ((i + 1)..n).filter(|&j| active[j]) {
                let q = h[i][j] - (b[i] + b[j]) / denom;
                if best.map_or(true, |(_, _, min_q)| q < min_q) {
                    best = Some((i, j, q));
                }
            }
        }
        let (i, j, _) = best.ok_or_else(|| {
            OrdoError::Other("neighbor joining: no active pair left".into())
        })?;

        let dij = h[i][j];
        let dist_e = clamp(0.5 * (dij + (b[i] - b[j]) / denom), &mut clamped);
        let dist_f = clamp(dij - 0.5 * (dij + (b[i] - b[j]) / denom), &mut clamped);

        for k in 0..n {
            if active[k] && k != i && k != j {
                let v = 0.5 * (h[k][i] + h[k][j] - dist_e - dist_f);
                h[k][i] = v;
                h[i][k] = v;
            }
        }

        let node = tree.add_node(None, None);
        tree.add_edge(slot_node[i], node, dist_e)?;
        tree.add_edge(slot_node[j], node, dist_f)?;
        slot_node[i] = node;
        active[j] = false;
        n_active -= 1;
    }

    let last: Vec<usize> = (0..n).filter(|&k| active[k]).collect();
    let (i, j) = (last[0], last[1]);
    let w = clamp(h[i][j], &mut clamped);
    tree.add_edge(slot_node[i], slot_node[j], w)?;

    finish(&mut tree, clamped, "neighbor joining");
    Ok(tree)
}

/// Build a rooted, ultrametric tree using UPGMA.
pub fn upgma(taxa: &Taxa, distances: &Distances) -> Result<PhyloTree> {
    upgma_with_progress(taxa, distances, &Silent)
}

/// UPGMA, polling `progress` once per merge.
///
/// Clusters are merged at half their average-linkage distance until two
/// remain; those two are joined under a root whose edges put it at half
/// their distance above the leaves, keeping the tree ultrametric.
///
/// # Errors
///
/// Returns an error if fewer than two taxa are given, the taxa and matrix
/// disagree, or `progress` requests cancellation.
pub fn upgma_with_progress(
    taxa: &Taxa,
    distances: &Distances,
    progress: &dyn ProgressListener,
) -> Result<PhyloTree> {
    let n = validate_inputs(taxa, distances)?;
    let mut dist = distances.to_rows();
    let mut tree = PhyloTree::new();
    let mut node_of = add_leaves(&mut tree, taxa, n);
    let mut cluster_size: Vec<usize> = vec![1; n];
    let mut heights: Vec<f64> = vec![0.0; n];
    let mut n_active = n;
    let mut clamped = 0;

    while n_active > 2 {
        progress.step(n - n_active, n - 2)?;

        let (mut min_i, mut min_j) = (0, 1);
        let mut min_dist = dist[0][1];
        for i in 0..n_active {
            for j in (i + 1)..n_active {
                if dist[i][j] < min_dist {
                    min_dist = dist[i][j];
                    min_i = i;
                    min_j = j;
                }
            }
        }

        let new_height = min_dist / 2.0;
        let node = tree.add_node(None, None);
        let w_i = clamp(new_height - heights[min_i], &mut clamped);
        let w_j = clamp(new_height - heights[min_j], &mut clamped);
        tree.add_edge(node, node_of[min_i], w_i)?;
        tree.add_edge(node, node_of[min_j], w_j)?;

        // Average-linkage update into slot min_i
        let size_i = cluster_size[min_i] as f64;
        let size_j = cluster_size[min_j] as f64;
        for k in 0..n_active {
            if k != min_i && k != min_j {
                let d = (dist[min_i][k] * size_i + dist[min_j][k] * size_j) / (size_i + size_j);
                dist[min_i][k] = d;
                dist[k][min_i] = d;
            }
        }
        node_of[min_i] = node;
        cluster_size[min_i] += cluster_size[min_j];
        heights[min_i] = new_height;

        // Move the last active slot into min_j
        let last = n_active - 1;
        if min_j != last {
            for k in 0..n_active {
                dist[min_j][k] = dist[last][k];
                dist[k][min_j] = dist[k][last];
            }
            dist[min_j][min_j] = 0.0;
            node_of[min_j] = node_of[last];
            cluster_size[min_j] = cluster_size[last];
            heights[min_j] = heights[last];
        }
        n_active -= 1;
    }

    // Join the final two clusters. Subtracting both subtree heights from the
    // distance puts the root at dist / 2 on either side, which keeps the
    // tree ultrametric.
    let (h1, hs) = (heights[0], heights[1]);
    let gap = dist[0][1] - h1 - hs;
    let delta = (h1 - hs).abs();
    let distance = gap - delta;
    let (w1, ws) = if h1 <= hs {
        (0.5 * distance + delta, 0.5 * distance)
    } else {
        (0.5 * distance, 0.5 * distance + delta)
    };
    let root = tree.add_node(None, None);
    let w1 = clamp(w1, &mut clamped);
    let ws = clamp(ws, &mut clamped);
    tree.add_edge(root, node_of[0], w1)?;
    tree.add_edge(root, node_of[1], ws)?;
    tree.set_root(root)?;

    finish(&mut tree, clamped, "upgma");
    Ok(tree)
}

/// Validate inputs, returning the number of taxa.
fn validate_inputs(taxa: &Taxa, distances: &Distances) -> Result<usize> {
    distances.check_taxa(taxa)?;
    let n = distances.ntax();
    if n < 2 {
        return Err(OrdoError::InvalidInput(format!(
            "need at least 2 taxa to build a tree, got {}",
            n
        )));
    }
    Ok(n)
}

/// One leaf per taxon, node id `i` for taxon id `i + 1`.
fn add_leaves(tree: &mut PhyloTree, taxa: &Taxa, n: usize) -> Vec<NodeId> {
    (1..=n)
        .map(|id| tree.add_node(taxa.label(id).map(str::to_string), Some(id)))
        .collect()
}

fn clamp(weight: f64, clamped: &mut usize) -> f64 {
    if weight < 0.0 {
        *clamped += 1;
        0.0
    } else {
        weight
    }
}

fn finish(tree: &mut PhyloTree, clamped: usize, method: &str) {
    tree.set_clamped_edges(clamped);
    if clamped > 0 {
        warn!(
            "{}: {} negative branch length(s) set to zero",
            method, clamped
        );
    }
    debug!(
        "{}: built tree with {} nodes, {} edges",
        method,
        tree.node_count(),
        tree.edge_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_core::CancelFlag;

    fn make_dm(n: usize, values: &[f64]) -> Distances {
        let mut dm = Distances::new(n);
        let mut idx = 0;
        for i in 1..=n {
            for j in (i + 1)..=n {
                dm.set(i, j, values[idx]);
                idx += 1;
            }
        }
        dm
    }

    fn names(n: usize) -> Taxa {
        Taxa::from_labels((0..n).map(|i| ((b'A' + i as u8) as char).to_string())).unwrap()
    }

    fn leaf(tree: &PhyloTree, label: &str) -> NodeId {
        tree.leaf_by_label(label).unwrap()
    }

    fn assert_additive(tree: &PhyloTree, taxa: &Taxa, dm: &Distances) {
        for i in 1..=dm.ntax() {
            for j in (i + 1)..=dm.ntax() {
                let a = leaf(tree, taxa.label(i).unwrap());
                let b = leaf(tree, taxa.label(j).unwrap());
                let p = tree.path_length(a, b).unwrap();
                assert!(
                    (p - dm.get(i, j)).abs() < 1e-9,
                    "path {}-{} = {}, expected {}",
                    i,
                    j,
                    p,
                    dm.get(i, j)
                );
            }
        }
    }

    #[test]
    fn nj_quartet_recovers_branch_lengths() {
        // AB=5 AC=7 AD=8 BC=8 BD=9 CD=9
        let dm = make_dm(4, &[5.0, 7.0, 8.0, 8.0, 9.0, 9.0]);
        let taxa = names(4);
        let tree = neighbor_joining(&taxa, &dm).unwrap();
        assert_eq!(tree.node_count(), 6);
        assert_eq!(tree.edge_count(), 5);
        assert_eq!(tree.leaf_count(), 4);
        assert!(!tree.is_rooted());
        assert_eq!(tree.clamped_edges(), 0);

        let a = leaf(&tree, "A");
        let b = leaf(&tree, "B");
        let c = leaf(&tree, "C");
        let d = leaf(&tree, "D");
        let (u, wa) = tree.neighbors(a)[0];
        let (u2, wb) = tree.neighbors(b)[0];
        let (v, wc) = tree.neighbors(c)[0];
        let (v2, wd) = tree.neighbors(d)[0];
        assert_eq!(u, u2);
        assert_eq!(v, v2);
        assert!((wa - 2.0).abs() < 1e-9);
        assert!((wb - 3.0).abs() < 1e-9);
        assert!((wc - 4.0).abs() < 1e-9);
        assert!((wd - 5.0).abs() < 1e-9);
        assert!((tree.path_length(u, v).unwrap() - 1.0).abs() < 1e-9);
        assert_additive(&tree, &taxa, &dm);
    }

    #[test]
    fn nj_three_taxa_star() {
        let dm = make_dm(3, &[5.0, 9.0, 10.0]);
        let taxa = names(3);
        let tree = neighbor_joining(&taxa, &dm).unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.edge_count(), 3);
        let center = 3;
        assert_eq!(tree.node(center).unwrap().degree(), 3);
        assert_additive(&tree, &taxa, &dm);
    }

    #[test]
    fn nj_two_taxa_single_edge() {
        let dm = make_dm(2, &[3.5]);
        let taxa = names(2);
        let tree = neighbor_joining(&taxa, &dm).unwrap();
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.edge_count(), 1);
        assert!((tree.edges()[0].weight - 3.5).abs() < 1e-12);
    }

    #[test]
    fn nj_additive_five_taxa() {
        // ((A:1,B:2):1.5,C:3,(D:0.5,E:2.5):2)
        let dm = make_dm(
            5,
            &[
                3.0, 5.5, 5.0, 7.0, // A
                6.5, 6.0, 8.0, // B
                5.5, 7.5, // C
                3.0, // D
            ],
        );
        let taxa = names(5);
        let tree = neighbor_joining(&taxa, &dm).unwrap();
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.edge_count(), tree.node_count() - 1);
        assert_additive(&tree, &taxa, &dm);
    }

    #[test]
    fn nj_negative_branch_clamped() {
        // violates the triangle inequality
        let dm = make_dm(3, &[10.0, 1.0, 1.0]);
        let taxa = names(3);
        let tree = neighbor_joining(&taxa, &dm).unwrap();
        assert_eq!(tree.clamped_edges(), 1);
        assert!(tree.edges().iter().all(|e| e.weight >= 0.0));
    }

    #[test]
    fn upgma_ultrametric_five_taxa() {
        // ((A:1,B:1):2,(C:2,(D:1.5,E:1.5):0.5):1)
        let dm = make_dm(
            5,
            &[
                2.0, 6.0, 6.0, 6.0, // A
                6.0, 6.0, 6.0, // B
                4.0, 4.0, // C
                3.0, // D
            ],
        );
        let taxa = names(5);
        let tree = upgma(&taxa, &dm).unwrap();
        assert!(tree.is_rooted());
        assert_eq!(tree.leaf_count(), 5);
        assert_eq!(tree.node_count(), 9);
        assert_eq!(tree.clamped_edges(), 0);

        let root = tree.root().unwrap();
        assert!((tree.height(root).unwrap() - 3.0).abs() < 1e-9);
        for i in 1..=5 {
            for j in (i + 1)..=5 {
                let a = leaf(&tree, taxa.label(i).unwrap());
                let b = leaf(&tree, taxa.label(j).unwrap());
                let lca = tree.mrca(a, b).unwrap();
                let h = tree.height(lca).unwrap();
                assert!((2.0 * h - dm.get(i, j)).abs() < 1e-9);
                // every leaf sits at the same depth below the root
                assert!((tree.path_length(root, a).unwrap() - 3.0).abs() < 1e-9);
            }
        }
        assert_additive(&tree, &taxa, &dm);
    }

    #[test]
    fn upgma_two_taxa() {
        let dm = make_dm(2, &[4.0]);
        let taxa = names(2);
        let tree = upgma(&taxa, &dm).unwrap();
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.root(), Some(2));
        for (_, w) in tree.neighbors(2) {
            assert!((w - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn upgma_merges_closest_first() {
        let dm = make_dm(4, &[2.0, 6.0, 10.0, 6.0, 10.0, 10.0]);
        let taxa = names(4);
        let tree = upgma(&taxa, &dm).unwrap();
        let a = leaf(&tree, "A");
        let b = leaf(&tree, "B");
        let c = leaf(&tree, "C");
        let ab = tree.mrca(a, b).unwrap();
        assert!((tree.height(ab).unwrap() - 1.0).abs() < 1e-12);
        assert!((tree.height(tree.mrca(a, c).unwrap()).unwrap() - 3.0).abs() < 1e-12);
        assert!((tree.height(tree.root().unwrap()).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn leaves_carry_taxa() {
        let dm = make_dm(3, &[1.0, 2.0, 2.0]);
        let taxa = names(3);
        let tree = upgma(&taxa, &dm).unwrap();
        for (id, label) in taxa.iter() {
            let node = tree.node(leaf(&tree, label)).unwrap();
            assert_eq!(node.taxon, Some(id));
        }
    }

    #[test]
    fn too_few_taxa_error() {
        let dm = Distances::new(1);
        let taxa = names(1);
        assert!(upgma(&taxa, &dm).is_err());
        assert!(neighbor_joining(&taxa, &dm).is_err());
    }

    #[test]
    fn taxa_mismatch_error() {
        let dm = make_dm(3, &[1.0, 2.0, 3.0]);
        let taxa = names(4);
        assert!(upgma(&taxa, &dm).is_err());
        assert!(neighbor_joining(&taxa, &dm).is_err());
    }

    #[test]
    fn canceled_before_first_join() {
        let dm = make_dm(4, &[5.0, 7.0, 8.0, 8.0, 9.0, 9.0]);
        let taxa = names(4);
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(matches!(
            neighbor_joining_with_progress(&taxa, &dm, &flag),
            Err(OrdoError::Canceled)
        ));
        assert!(matches!(
            upgma_with_progress(&taxa, &dm, &flag),
            Err(OrdoError::Canceled)
        ));
    }

    #[test]
    fn progress_reported() {
        let dm = make_dm(4, &[5.0, 7.0, 8.0, 8.0, 9.0, 9.0]);
        let taxa = names(4);
        let flag = CancelFlag::new();
        neighbor_joining_with_progress(&taxa, &dm, &flag).unwrap();
        assert_eq!(flag.progress(), (1, 2));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn random_dm() -> impl Strategy<Value = (usize, Vec<f64>)> {
            (2usize..9).prop_flat_map(|n| {
                (
                    Just(n),
                    proptest::collection::vec(0.0f64..100.0, n * (n - 1) / 2),
                )
            })
        }

        proptest! {
            #[test]
            fn weights_never_negative((n, values) in random_dm()) {
                let dm = make_dm(n, &values);
                let taxa = names(n);
                for tree in [neighbor_joining(&taxa, &dm).unwrap(), upgma(&taxa, &dm).unwrap()] {
                    prop_assert_eq!(tree.leaf_count(), n);
                    prop_assert_eq!(tree.edge_count(), tree.node_count() - 1);
                    prop_assert!(tree.edges().iter().all(|e| e.weight >= 0.0));
                }
            }
        }
    }
}
