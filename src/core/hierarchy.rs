//! Hierarchy construction: remove MST edges in descending weight order,
//! detecting cluster splits and births along the way.
//!
//! All edges tied at one weight are processed as a single batch so that a
//! simultaneous density drop produces one hierarchy level rather than several
//! spurious ones.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::cluster::{Cluster, ClusterSet};
use super::constraint::Constraint;
use super::graph::UndirectedGraph;
use crate::error::Result;

/// A snapshot of every point's cluster label at one significant edge weight.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyEntry {
    pub edge_weight: f64,
    pub labels: Vec<usize>,
}

/// Everything the edge-removal pass produces besides the cluster tree
/// itself. The noise arrays survive until outlier scoring.
#[derive(Debug)]
pub(crate) struct HierarchyBuild {
    pub hierarchy: BTreeMap<i64, HierarchyEntry>,
    pub point_noise_levels: Vec<f64>,
    pub point_last_clusters: Vec<usize>,
}

/// Consumes a weight-sorted spanning tree and grows the cluster tree inside
/// `clusters`, which must be empty on entry.
///
/// Walking the sorted edge list tail-first, each batch of equal-weight edges
/// is removed from the adjacency lists, after which every affected cluster is
/// re-explored. A cluster that falls apart into two or more components of at
/// least `min_points` members has split; exactly one surviving component
/// means the cluster merely shrank. Components below the threshold turn to
/// noise, recording the level and owning cluster of every lost point.
pub(crate) fn compute_hierarchy_and_cluster_tree(
    mst: &mut UndirectedGraph,
    min_points: usize,
    compact_hierarchy: bool,
    constraints: &[Constraint],
    clusters: &mut ClusterSet,
) -> Result<HierarchyBuild> {
    let num_vertices = mst.num_vertices();
    let mut current_labels = vec![1_usize; num_vertices];
    let mut previous_labels = vec![1_usize; num_vertices];
    let mut point_noise_levels = vec![0.0_f64; num_vertices];
    let mut point_last_clusters = vec![0_usize; num_vertices];

    clusters.seed_root(num_vertices);

    let mut hierarchy: BTreeMap<i64, HierarchyEntry> = BTreeMap::new();
    let mut line_count: i64 = 0;
    let mut next_cluster_label = 2_usize;
    let mut next_level_significant = true;

    let mut affected_cluster_labels: BTreeSet<usize> = BTreeSet::new();
    let mut affected_vertices: BTreeSet<usize> = BTreeSet::new();
    let mut new_clusters: Vec<usize> = Vec::new();

    let mut edge_index = mst.num_edges();
    while edge_index > 0 {
        let current_edge_weight = mst.weight(edge_index - 1);
        new_clusters.clear();

        // Remove every edge tied at this weight, noting the clusters and
        // vertices the removals touch. Edges between points that are
        // already noise still come out of the graph but affect nothing.
        while edge_index > 0 && mst.weight(edge_index - 1) == current_edge_weight {
            let (first_vertex, second_vertex) = mst.edge_vertices(edge_index - 1);
            mst.remove_edge(first_vertex, second_vertex);
            edge_index -= 1;

            if current_labels[first_vertex] == 0 {
                continue;
            }
            affected_vertices.insert(first_vertex);
            affected_vertices.insert(second_vertex);
            affected_cluster_labels.insert(current_labels[first_vertex]);
        }

        if affected_cluster_labels.is_empty() {
            continue;
        }

        while let Some(&examined_label) = affected_cluster_labels.iter().next_back() {
            affected_cluster_labels.remove(&examined_label);

            // Pull out the affected vertices that belong to this cluster.
            let mut examined_vertices: BTreeSet<usize> = BTreeSet::new();
            let members: Vec<usize> = affected_vertices
                .iter()
                .copied()
                .filter(|&vertex| current_labels[vertex] == examined_label)
                .collect();
            for vertex in members {
                affected_vertices.remove(&vertex);
                examined_vertices.insert(vertex);
            }

            let mut first_child: BTreeSet<usize> = BTreeSet::new();
            let mut unexplored_first_child: BTreeSet<usize> = BTreeSet::new();
            let mut num_child_clusters = 0_usize;

            // Explore the remaining graph from each affected vertex. The
            // first component to reach `min_points` is suspended rather
            // than fully walked; it only needs finishing if the cluster
            // actually split.
            while let Some(&root_vertex) = examined_vertices.iter().next_back() {
                examined_vertices.remove(&root_vertex);

                let mut constructing: BTreeSet<usize> = BTreeSet::new();
                let mut unexplored: Vec<usize> = Vec::new();
                let mut any_edges = false;
                let mut incremented_child_count = false;
                constructing.insert(root_vertex);
                unexplored.push(root_vertex);

                while let Some(vertex) = unexplored.pop() {
                    for &neighbor in mst.neighbors(vertex) {
                        any_edges = true;
                        if constructing.insert(neighbor) {
                            unexplored.push(neighbor);
                            examined_vertices.remove(&neighbor);
                        }
                    }

                    if !incremented_child_count && constructing.len() >= min_points && any_edges {
                        incremented_child_count = true;
                        num_child_clusters += 1;

                        if first_child.is_empty() {
                            first_child.extend(constructing.iter().copied());
                            unexplored_first_child.extend(unexplored.iter().copied());
                            break;
                        }
                    }
                }

                if num_child_clusters >= 2 && constructing.len() >= min_points && any_edges {
                    // The suspended first child shows up again when one of
                    // its unexplored points is drawn as a root; it must not
                    // be counted twice.
                    let revisited = first_child
                        .iter()
                        .next_back()
                        .map_or(false, |member| constructing.contains(member));
                    if revisited {
                        num_child_clusters -= 1;
                    } else {
                        let label = next_cluster_label;
                        next_cluster_label += 1;
                        create_new_cluster(
                            clusters,
                            &constructing,
                            &mut current_labels,
                            examined_label,
                            label,
                            current_edge_weight,
                        )?;
                        new_clusters.push(label);
                    }
                } else if constructing.len() < min_points || !any_edges {
                    create_new_cluster(
                        clusters,
                        &constructing,
                        &mut current_labels,
                        examined_label,
                        0,
                        current_edge_weight,
                    )?;
                    for &point in &constructing {
                        point_noise_levels[point] = current_edge_weight;
                        point_last_clusters[point] = examined_label;
                    }
                }
            }

            // Finish the first child only on a real split, and only if its
            // points still carry the examined label.
            let first_child_intact = first_child
                .iter()
                .next()
                .map_or(false, |&member| current_labels[member] == examined_label);
            if num_child_clusters >= 2 && first_child_intact {
                while let Some(&vertex) = unexplored_first_child.iter().next_back() {
                    unexplored_first_child.remove(&vertex);
                    for &neighbor in mst.neighbors(vertex) {
                        if first_child.insert(neighbor) {
                            unexplored_first_child.insert(neighbor);
                        }
                    }
                }

                let label = next_cluster_label;
                next_cluster_label += 1;
                create_new_cluster(
                    clusters,
                    &first_child,
                    &mut current_labels,
                    examined_label,
                    label,
                    current_edge_weight,
                )?;
                new_clusters.push(label);
            }
        }

        if !compact_hierarchy || next_level_significant || !new_clusters.is_empty() {
            line_count += 1;
            hierarchy.insert(
                line_count,
                HierarchyEntry {
                    edge_weight: current_edge_weight,
                    labels: previous_labels.clone(),
                },
            );
            debug!(
                "hierarchy level {} at weight {} ({} new clusters)",
                line_count,
                current_edge_weight,
                new_clusters.len()
            );
        }

        for &label in &new_clusters {
            if let Some(cluster) = clusters.get_mut(label) {
                cluster.set_offset(line_count);
            }
        }
        calculate_num_constraints_satisfied(constraints, &new_clusters, &current_labels, clusters);

        previous_labels.copy_from_slice(&current_labels);
        next_level_significant = !new_clusters.is_empty();
    }

    // The terminal level: every point is noise.
    hierarchy.insert(
        0,
        HierarchyEntry {
            edge_weight: 0.0,
            labels: vec![0; num_vertices],
        },
    );

    Ok(HierarchyBuild {
        hierarchy,
        point_noise_levels,
        point_last_clusters,
    })
}

/// Moves `points` out of their parent cluster at `edge_weight`. A non-zero
/// label mints a new cluster for them; label 0 sends them to noise and into
/// the parent's virtual child instead.
fn create_new_cluster(
    clusters: &mut ClusterSet,
    points: &BTreeSet<usize>,
    current_labels: &mut [usize],
    parent_label: usize,
    label: usize,
    edge_weight: f64,
) -> Result<()> {
    for &point in points {
        current_labels[point] = label;
    }
    if let Some(parent) = clusters.get_mut(parent_label) {
        parent.detach_points(points.len(), edge_weight)?;
    }

    if label != 0 {
        if let Some(parent) = clusters.get_mut(parent_label) {
            parent.set_has_children();
        }
        clusters.push(Cluster::new(
            label,
            Some(parent_label),
            Some(edge_weight),
            points.len(),
        ));
    } else if let Some(parent) = clusters.get_mut(parent_label) {
        parent.add_virtual_child_points(points.iter().copied());
    }
    Ok(())
}

/// Placeholder for constraint-satisfaction accounting. The counters stay at
/// zero until a constraint engine fills them in; the propagation tie-breaks
/// already consult them.
fn calculate_num_constraints_satisfied(
    constraints: &[Constraint],
    _new_clusters: &[usize],
    _current_labels: &[usize],
    _clusters: &mut ClusterSet,
) {
    if constraints.is_empty() {
        return;
    }
}
