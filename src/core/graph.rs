//! An undirected graph held as three parallel edge arrays plus a per-vertex
//! adjacency list. The hierarchy construction tears this graph down edge by
//! edge, so removal has to be cheap and order-preserving.

use crate::utils::helpers;

/// Edge list representation of the (possibly self-looped) spanning tree.
///
/// `vertices_a[i]` and `vertices_b[i]` are the endpoints of edge `i` and
/// `edge_weights[i]` its weight. `edges[v]` lists the neighbors of `v` in the
/// order their edges were recorded; a self-edge contributes `v` to its own
/// list exactly once.
#[derive(Clone, Debug)]
pub struct UndirectedGraph {
    num_vertices: usize,
    vertices_a: Vec<usize>,
    vertices_b: Vec<usize>,
    edge_weights: Vec<f64>,
    edges: Vec<Vec<usize>>,
}

impl UndirectedGraph {
    pub fn new(
        num_vertices: usize,
        vertices_a: Vec<usize>,
        vertices_b: Vec<usize>,
        edge_weights: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(vertices_a.len(), vertices_b.len());
        debug_assert_eq!(vertices_a.len(), edge_weights.len());

        let mut edges = vec![Vec::new(); num_vertices];
        for (&a, &b) in vertices_a.iter().zip(vertices_b.iter()) {
            edges[a].push(b);
            if a != b {
                edges[b].push(a);
            }
        }

        UndirectedGraph {
            num_vertices,
            vertices_a,
            vertices_b,
            edge_weights,
            edges,
        }
    }

    /// Reorders the parallel edge arrays by ascending weight. Ties keep their
    /// original relative order, so the layout is deterministic. The adjacency
    /// lists are left in recording order.
    pub fn sort_by_edge_weight(&mut self) {
        let order = helpers::argsort(&self.edge_weights);
        self.vertices_a = order.iter().map(|&i| self.vertices_a[i]).collect();
        self.vertices_b = order.iter().map(|&i| self.vertices_b[i]).collect();
        self.edge_weights = order.iter().map(|&i| self.edge_weights[i]).collect();
    }

    /// Removes the edge between `a` and `b` from the adjacency lists.
    ///
    /// Both directions are removed independently so that a self-edge, which
    /// appears once in its vertex's list, is fully dropped by a single call.
    pub fn remove_edge(&mut self, a: usize, b: usize) {
        if let Some(position) = self.edges[a].iter().position(|&v| v == b) {
            self.edges[a].remove(position);
        }
        if let Some(position) = self.edges[b].iter().position(|&v| v == a) {
            self.edges[b].remove(position);
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_edges(&self) -> usize {
        self.edge_weights.len()
    }

    /// The endpoints of edge `index`.
    pub fn edge_vertices(&self, index: usize) -> (usize, usize) {
        (self.vertices_a[index], self.vertices_b[index])
    }

    /// The weight of edge `index`.
    pub fn weight(&self, index: usize) -> f64 {
        self.edge_weights[index]
    }

    /// The current neighbors of `vertex`.
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.edges[vertex]
    }
}

#[cfg(test)]
mod tests {
    use super::UndirectedGraph;

    fn small_graph() -> UndirectedGraph {
        UndirectedGraph::new(
            3,
            vec![0, 1, 2, 2],
            vec![1, 2, 0, 2],
            vec![3.0, 1.0, 2.0, 1.0],
        )
    }

    #[test]
    fn test_adjacency() {
        let graph = small_graph();
        assert_eq!(graph.neighbors(0), &[1, 2]);
        assert_eq!(graph.neighbors(1), &[0, 2]);
        assert_eq!(graph.neighbors(2), &[1, 0, 2]);
    }

    #[test]
    fn test_sort_by_edge_weight() {
        let mut graph = small_graph();
        graph.sort_by_edge_weight();

        let triplets: Vec<(usize, usize, f64)> = (0..graph.num_edges())
            .map(|i| {
                let (a, b) = graph.edge_vertices(i);
                (a, b, graph.weight(i))
            })
            .collect();
        assert_eq!(
            triplets,
            vec![(1, 2, 1.0), (2, 2, 1.0), (2, 0, 2.0), (0, 1, 3.0)]
        );
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = small_graph();
        graph.remove_edge(0, 1);
        assert_eq!(graph.neighbors(0), &[2]);
        assert_eq!(graph.neighbors(1), &[2]);

        // A self-edge is fully dropped by one call.
        graph.remove_edge(2, 2);
        assert_eq!(graph.neighbors(2), &[1, 0]);
        graph.remove_edge(2, 2);
        assert_eq!(graph.neighbors(2), &[1, 0]);
    }
}
