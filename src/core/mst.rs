//! Prim's algorithm over the implicit complete graph of mutual reachability
//! distances. The graph is never materialised; each relaxation recomputes
//! `max(core(u), core(v), dist(u, v))` from the distance store.

use bitvec::prelude::*;
use rayon::prelude::*;

use super::distance::DistanceMatrix;
use super::graph::UndirectedGraph;

/// Builds the minimum spanning tree of the mutual reachability graph.
///
/// The tree is grown from the last point in the data set. Every iteration
/// relaxes all unattached vertices against the point attached most recently
/// and then picks the unattached vertex with the smallest tentative distance;
/// on ties the later vertex in scan order wins, which fixes the order in
/// which equal-weight edges are emitted.
///
/// With `self_edges` enabled the final `N` slots hold an edge `(v, v)` of
/// weight `core(v)` for every vertex, so the hierarchy can record the level
/// at which each point turns to noise.
pub fn build(matrix: &DistanceMatrix, self_edges: bool) -> UndirectedGraph {
    let size = matrix.rows();
    let core_distances = matrix.core_distances();

    let mut attached = bitvec![0; size];
    let mut nearest_neighbors = vec![0_usize; size - 1];
    let mut nearest_distances = vec![f64::INFINITY; size - 1];

    let mut current_point = size - 1;
    attached.set(current_point, true);

    for _ in 1..size {
        let current_core = core_distances[current_point];
        let attached_view = &attached;

        // Selection keeps the later index on equal distances no matter how
        // the scan is chunked.
        let (nearest_point, _) = nearest_distances
            .par_iter_mut()
            .zip(nearest_neighbors.par_iter_mut())
            .enumerate()
            .filter(|&(neighbor, _)| neighbor != current_point && !attached_view[neighbor])
            .map(|(neighbor, (distance, tree_neighbor))| {
                let mut reachability = matrix.get(neighbor, current_point);
                if current_core > reachability {
                    reachability = current_core;
                }
                if core_distances[neighbor] > reachability {
                    reachability = core_distances[neighbor];
                }
                if reachability < *distance {
                    *distance = reachability;
                    *tree_neighbor = current_point;
                }
                (neighbor, *distance)
            })
            .reduce(
                || (usize::MAX, f64::INFINITY),
                |earlier, later| {
                    if later.1 <= earlier.1 {
                        later
                    } else {
                        earlier
                    }
                },
            );

        attached.set(nearest_point, true);
        current_point = nearest_point;
    }

    // Edge i attaches vertex i to the tree; the start vertex owns no edge.
    let mut vertices_a = nearest_neighbors;
    let mut vertices_b: Vec<usize> = (0..size - 1).collect();
    let mut edge_weights = nearest_distances;

    if self_edges {
        for vertex in 0..size {
            vertices_a.push(vertex);
            vertices_b.push(vertex);
            edge_weights.push(core_distances[vertex]);
        }
    }

    UndirectedGraph::new(size, vertices_a, vertices_b, edge_weights)
}
