//! The top-level HDBSCAN* runner: owns the distance store, the cluster
//! tree, the hierarchy, and the flat result of a run.

use std::collections::BTreeMap;
use std::io;

use log::{debug, warn};

use super::cluster::ClusterSet;
use super::constraint::Constraint;
use super::distance::{DistanceKind, DistanceMatrix};
use super::hierarchy::{self, HierarchyEntry};
use super::mst;
use super::number::Number;
use super::outlier::{self, OutlierScore};
use super::stats::{self, DistanceValues};
use crate::error::{HdbscanError, Result};

/// A configured HDBSCAN* instance.
///
/// `min_points` doubles as the neighbor count for core distances and as the
/// minimum cluster size. Chain `run`, then read the results through the
/// accessors; `rerun` repeats everything from the core distances down with a
/// new `min_points`, reusing the pairwise distance matrix.
#[derive(Debug)]
pub struct Hdbscan {
    min_points: usize,
    self_edges: bool,
    compact_hierarchy: bool,
    distance_kind: DistanceKind,
    constraints: Vec<Constraint>,
    num_points: usize,
    distance_matrix: Option<DistanceMatrix>,
    clusters: ClusterSet,
    cluster_labels: Vec<usize>,
    hierarchy: BTreeMap<i64, HierarchyEntry>,
    outlier_scores: Vec<OutlierScore>,
    infinite_stability: bool,
}

impl Hdbscan {
    /// Creates an instance with the given density parameter.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `min_points` is below 2.
    pub fn new(min_points: usize) -> Result<Self> {
        if min_points < 2 {
            return Err(HdbscanError::invalid("min_points must be at least 2"));
        }
        Ok(Hdbscan {
            min_points,
            self_edges: true,
            compact_hierarchy: false,
            distance_kind: DistanceKind::Euclidean,
            constraints: Vec::new(),
            num_points: 0,
            distance_matrix: None,
            clusters: ClusterSet::new(),
            cluster_labels: Vec::new(),
            hierarchy: BTreeMap::new(),
            outlier_scores: Vec::new(),
            infinite_stability: false,
        })
    }

    /// Whether to augment the spanning tree with per-vertex self-edges
    /// weighted by core distance. On by default; without them the hierarchy
    /// cannot record the level at which each point becomes noise.
    pub fn with_self_edges(mut self, self_edges: bool) -> Self {
        self.self_edges = self_edges;
        self
    }

    /// Whether to omit hierarchy levels that introduce no new clusters.
    pub fn with_compact_hierarchy(mut self, compact_hierarchy: bool) -> Self {
        self.compact_hierarchy = compact_hierarchy;
        self
    }

    pub fn with_distance_kind(mut self, distance_kind: DistanceKind) -> Self {
        self.distance_kind = distance_kind;
        self
    }

    /// Installs the pairwise constraints consulted by the propagation
    /// tie-breaks. No satisfaction counting happens yet.
    pub fn set_constraints(&mut self, constraints: Vec<Constraint>) {
        self.constraints = constraints;
    }

    /// Clusters a flat numeric buffer.
    ///
    /// With `rowwise` set, the buffer holds `rows` points of `cols`
    /// attributes each, row-major. Otherwise every scalar in the buffer is
    /// treated as its own one-dimensional point, yielding `rows * cols`
    /// points.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the buffer does not match the declared shape,
    /// when there are fewer than two points, or when `min_points` exceeds
    /// the number of points. The instance is left untouched in those cases.
    pub fn run<T: Number>(&mut self, data: &[T], rows: usize, cols: usize, rowwise: bool) -> Result<()> {
        if data.len() != rows * cols {
            return Err(HdbscanError::invalid(format!(
                "buffer holds {} values but {} rows of {} columns were declared",
                data.len(),
                rows,
                cols
            )));
        }

        let (num_points, dimensions) = if rowwise { (rows, cols) } else { (rows * cols, 1) };
        if num_points < 2 {
            return Err(HdbscanError::invalid("at least two points are required"));
        }
        if self.min_points > num_points {
            return Err(HdbscanError::invalid(format!(
                "min_points {} exceeds the number of points {}",
                self.min_points, num_points
            )));
        }

        debug!(
            "computing pairwise distances over {} points of dimension {}",
            num_points, dimensions
        );
        self.num_points = num_points;
        self.distance_matrix = Some(DistanceMatrix::compute(
            data,
            num_points,
            dimensions,
            self.min_points - 1,
            self.distance_kind,
        ));

        self.do_run()
    }

    /// Repeats the pipeline from the core distances down with a new density
    /// parameter, reusing the stored pairwise distances.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `run` has not produced a distance matrix yet or
    /// when the new `min_points` is out of range.
    pub fn rerun(&mut self, min_points: usize) -> Result<()> {
        if min_points < 2 {
            return Err(HdbscanError::invalid("min_points must be at least 2"));
        }
        if self.distance_matrix.is_none() {
            return Err(HdbscanError::invalid("rerun requires a completed run"));
        }
        if min_points > self.num_points {
            return Err(HdbscanError::invalid(format!(
                "min_points {} exceeds the number of points {}",
                min_points, self.num_points
            )));
        }

        self.min_points = min_points;
        if let Some(matrix) = self.distance_matrix.as_mut() {
            matrix.refresh_core(min_points - 1);
        }

        self.do_run()
    }

    /// Everything from the spanning tree onward. Assumes the distance
    /// matrix and core distances are in place.
    fn do_run(&mut self) -> Result<()> {
        self.clusters = ClusterSet::new();
        self.cluster_labels = Vec::new();
        self.hierarchy = BTreeMap::new();
        self.outlier_scores = Vec::new();
        self.infinite_stability = false;

        let matrix = self
            .distance_matrix
            .as_ref()
            .ok_or_else(|| HdbscanError::invalid("no distance matrix"))?;

        debug!("constructing the mutual reachability spanning tree");
        let mut spanning_tree = mst::build(matrix, self.self_edges);
        spanning_tree.sort_by_edge_weight();

        debug!("building the cluster hierarchy");
        let build = hierarchy::compute_hierarchy_and_cluster_tree(
            &mut spanning_tree,
            self.min_points,
            self.compact_hierarchy,
            &self.constraints,
            &mut self.clusters,
        )?;

        self.infinite_stability = self.clusters.propagate();
        if self.infinite_stability {
            warn!(
                "at least one cluster has infinite stability, usually caused by duplicate \
                 points; the flat partition should be interpreted with caution"
            );
        }

        self.cluster_labels =
            find_prominent_clusters(&self.clusters, &build.hierarchy, self.num_points);
        self.outlier_scores = outlier::calculate_outlier_scores(
            &self.clusters,
            &build.point_noise_levels,
            &build.point_last_clusters,
            matrix.core_distances(),
        );
        self.hierarchy = build.hierarchy;
        self.clusters.release_virtual_children();

        Ok(())
    }

    /// The flat cluster label of every point; 0 is noise. Empty before the
    /// first run.
    pub fn labels(&self) -> &[usize] {
        &self.cluster_labels
    }

    /// The core distance of every point. Empty before the first run.
    pub fn core_distances(&self) -> &[f64] {
        self.distance_matrix
            .as_ref()
            .map_or(&[], DistanceMatrix::core_distances)
    }

    /// The outlier scores, sorted ascending by score, core distance, and id.
    pub fn outlier_scores(&self) -> &[OutlierScore] {
        &self.outlier_scores
    }

    /// The cluster tree of the last run.
    pub fn clusters(&self) -> &ClusterSet {
        &self.clusters
    }

    /// The hierarchy levels keyed by level id; id 0 is the terminal
    /// all-noise entry.
    pub fn hierarchy(&self) -> &BTreeMap<i64, HierarchyEntry> {
        &self.hierarchy
    }

    /// Whether the last run tripped the infinite-stability warning.
    pub fn infinite_stability(&self) -> bool {
        self.infinite_stability
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// The pairwise distance store of the last run.
    pub fn distance_matrix(&self) -> Option<&DistanceMatrix> {
        self.distance_matrix.as_ref()
    }

    /// Groups the flat labels of the last run by cluster.
    pub fn cluster_map(&self) -> BTreeMap<usize, Vec<usize>> {
        stats::create_cluster_map(&self.cluster_labels, 0, self.num_points)
    }

    /// Per-cluster distance extrema for the given grouping; see
    /// [`stats::min_max_distances`].
    pub fn min_max_distances(
        &self,
        cluster_map: &BTreeMap<usize, Vec<usize>>,
    ) -> BTreeMap<usize, DistanceValues> {
        self.distance_matrix
            .as_ref()
            .map_or_else(BTreeMap::new, |matrix| {
                stats::min_max_distances(matrix, cluster_map)
            })
    }

    /// Writes the hierarchy as CSV, one row per level: the edge weight
    /// followed by every point's label at that level.
    pub fn write_hierarchy_csv<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        for entry in self.hierarchy.values() {
            write!(writer, "{:.15}", entry.edge_weight)?;
            for &label in &entry.labels {
                write!(writer, ",{}", label)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Writes the two-line header consumed by the hierarchy visualizer.
    pub fn write_visualization<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "1")?;
        writeln!(writer, "{}", self.hierarchy.len())
    }
}

/// Turns the propagated cluster tree into the flat label vector. The root's
/// selected descendants form the partition; each one labels its points from
/// the hierarchy entry just after its birth, and everything else stays
/// noise.
fn find_prominent_clusters(
    clusters: &ClusterSet,
    hierarchy: &BTreeMap<i64, HierarchyEntry>,
    num_points: usize,
) -> Vec<usize> {
    let solution = clusters
        .get(1)
        .map(|root| root.propagated_descendants())
        .unwrap_or(&[]);

    let mut significant: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for &label in solution {
        if let Some(cluster) = clusters.get(label) {
            significant.entry(cluster.offset()).or_default().push(label);
        }
    }

    let mut labels = vec![0_usize; num_points];
    for (&offset, cluster_list) in &significant {
        if let Some(entry) = hierarchy.get(&(offset + 1)) {
            for (point, &level_label) in entry.labels.iter().enumerate() {
                if cluster_list.contains(&level_label) {
                    labels[point] = level_label;
                }
            }
        }
    }
    labels
}
