//! Cluster-tree nodes and the label-indexed arena that owns them.
//!
//! The tree is full of back and cross references (parent pointers, selected
//! descendants), so ownership lives in a flat collection indexed by label and
//! every link is a plain label index.

use std::collections::BTreeSet;

use crate::error::{HdbscanError, Result};

/// One node of the cluster tree.
///
/// `birth_level` is `None` for the root, which exists before any edge is
/// removed; the `1/birth` term of the stability sum is taken as zero there.
/// A cluster that accumulates stability at level zero (duplicate points)
/// therefore reaches `+inf`, which is what the infinite-stability warning
/// reports.
#[derive(Clone, Debug)]
pub struct Cluster {
    label: usize,
    parent: Option<usize>,
    birth_level: Option<f64>,
    death_level: f64,
    num_points: usize,
    stability: f64,
    propagated_stability: f64,
    propagated_lowest_child_death_level: Option<f64>,
    num_constraints_satisfied: usize,
    propagated_num_constraints_satisfied: usize,
    has_children: bool,
    offset: i64,
    virtual_child_cluster: BTreeSet<usize>,
    propagated_descendants: Vec<usize>,
}

impl Cluster {
    pub(crate) fn new(
        label: usize,
        parent: Option<usize>,
        birth_level: Option<f64>,
        num_points: usize,
    ) -> Self {
        Cluster {
            label,
            parent,
            birth_level,
            death_level: 0.0,
            num_points,
            stability: 0.0,
            propagated_stability: 0.0,
            propagated_lowest_child_death_level: None,
            num_constraints_satisfied: 0,
            propagated_num_constraints_satisfied: 0,
            has_children: false,
            offset: 0,
            virtual_child_cluster: BTreeSet::new(),
            propagated_descendants: Vec::new(),
        }
    }

    /// Removes `num_points` points from the cluster at the given level,
    /// crediting `num_points * (1/level - 1/birth_level)` to its stability.
    /// When the last point leaves, the level is recorded as the death level.
    ///
    /// Detaching more points than the cluster owns means the spanning tree
    /// and the label arrays disagree; that is a fatal `LogicError`.
    pub fn detach_points(&mut self, num_points: usize, level: f64) -> Result<()> {
        self.num_points = self
            .num_points
            .checked_sub(num_points)
            .ok_or(HdbscanError::LogicError { label: self.label })?;

        let inverse_birth = self.birth_level.map_or(0.0, |birth| 1.0 / birth);
        self.stability += num_points as f64 * (1.0 / level - inverse_birth);

        if self.num_points == 0 {
            self.death_level = level;
        }
        Ok(())
    }

    pub(crate) fn add_virtual_child_points(&mut self, points: impl IntoIterator<Item = usize>) {
        self.virtual_child_cluster.extend(points);
    }

    /// Whether the point would belong to this cluster's virtual child, the
    /// "would-be" cluster formed by its noise points.
    pub fn virtual_child_contains_point(&self, point: usize) -> bool {
        self.virtual_child_cluster.contains(&point)
    }

    pub(crate) fn add_constraints_satisfied(&mut self, num_constraints: usize) {
        self.num_constraints_satisfied += num_constraints;
    }

    pub(crate) fn add_virtual_child_constraints_satisfied(&mut self, num_constraints: usize) {
        self.propagated_num_constraints_satisfied += num_constraints;
    }

    /// Drops the virtual child to free memory. Only call once constraint
    /// accounting over the virtual children is complete.
    pub(crate) fn release_virtual_child(&mut self) {
        self.virtual_child_cluster = BTreeSet::new();
    }

    pub fn label(&self) -> usize {
        self.label
    }

    /// The label of the parent cluster; `None` for the root.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// The edge weight at which the cluster appeared; `None` for the root.
    pub fn birth_level(&self) -> Option<f64> {
        self.birth_level
    }

    /// The edge weight at which the cluster lost its last point, or 0 while
    /// it still owns points.
    pub fn death_level(&self) -> f64 {
        self.death_level
    }

    /// The number of points currently attached.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn stability(&self) -> f64 {
        self.stability
    }

    pub fn propagated_stability(&self) -> f64 {
        self.propagated_stability
    }

    /// The lowest death level among this cluster's descendants, once the
    /// propagation pass has run.
    pub fn propagated_lowest_child_death_level(&self) -> Option<f64> {
        self.propagated_lowest_child_death_level
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// The hierarchy-level id at which this cluster was born.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    pub(crate) fn set_has_children(&mut self) {
        self.has_children = true;
    }

    /// The descendant clusters selected for this subtree by the propagation
    /// pass, as label indices.
    pub fn propagated_descendants(&self) -> &[usize] {
        &self.propagated_descendants
    }
}

/// The flat, label-indexed collection that owns every cluster of a run.
/// Index 0 is reserved for noise and holds no cluster.
#[derive(Debug, Default)]
pub struct ClusterSet {
    clusters: Vec<Option<Cluster>>,
}

impl ClusterSet {
    pub(crate) fn new() -> Self {
        ClusterSet {
            clusters: Vec::new(),
        }
    }

    /// Installs the noise slot and the root cluster owning every point.
    pub(crate) fn seed_root(&mut self, num_points: usize) {
        self.clusters.clear();
        self.clusters.push(None);
        self.clusters.push(Some(Cluster::new(1, None, None, num_points)));
    }

    /// Appends a freshly minted cluster. Labels are assigned sequentially,
    /// so the new cluster's label must equal the next free index.
    pub(crate) fn push(&mut self, cluster: Cluster) {
        debug_assert_eq!(cluster.label(), self.clusters.len());
        self.clusters.push(Some(cluster));
    }

    pub fn get(&self, label: usize) -> Option<&Cluster> {
        self.clusters.get(label).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, label: usize) -> Option<&mut Cluster> {
        self.clusters.get_mut(label).and_then(Option::as_mut)
    }

    /// The number of slots, including the reserved noise slot.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Iterates over the clusters in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter_map(Option::as_ref)
    }

    /// Propagates stability, constraint counts, and lowest child death
    /// levels from the leaves to the root. Every cluster is visited exactly
    /// once, children before parents.
    ///
    /// Returns whether any cluster's own stability reached the floating
    /// point sentinel, which happens when duplicate points produce a
    /// zero-weight edge.
    pub(crate) fn propagate(&mut self) -> bool {
        let mut to_examine: BTreeSet<usize> = BTreeSet::new();
        let mut added = vec![false; self.clusters.len()];

        for cluster in self.iter() {
            if !cluster.has_children {
                to_examine.insert(cluster.label);
                added[cluster.label] = true;
            }
        }

        let mut infinite_stability = false;
        while let Some(&label) = to_examine.iter().next_back() {
            to_examine.remove(&label);
            self.propagate_one(label);

            if let Some(cluster) = self.get(label) {
                if cluster.stability.is_infinite() || cluster.stability == f64::MAX {
                    infinite_stability = true;
                }
                if let Some(parent) = cluster.parent {
                    if !added[parent] {
                        added[parent] = true;
                        to_examine.insert(parent);
                    }
                }
            }
        }

        infinite_stability
    }

    /// The per-node propagation step: lift the lowest child death level into
    /// the parent, then hand the parent either this cluster itself or its
    /// already-selected descendants, whichever satisfies more constraints or,
    /// on a tie, carries more stability.
    fn propagate_one(&mut self, label: usize) {
        let Some(cluster) = self.get(label) else {
            return;
        };
        let Some(parent_label) = cluster.parent else {
            return;
        };

        let lowest_death = cluster
            .propagated_lowest_child_death_level
            .unwrap_or(cluster.death_level);
        let take_self = if !cluster.has_children
            || cluster.num_constraints_satisfied > cluster.propagated_num_constraints_satisfied
        {
            true
        } else if cluster.num_constraints_satisfied < cluster.propagated_num_constraints_satisfied {
            false
        } else {
            // A stability tie prefers the cluster over its descendants.
            cluster.stability >= cluster.propagated_stability
        };

        let (stability, constraints, descendants) = if take_self {
            (
                cluster.stability,
                cluster.num_constraints_satisfied,
                vec![label],
            )
        } else {
            (
                cluster.propagated_stability,
                cluster.propagated_num_constraints_satisfied,
                cluster.propagated_descendants.clone(),
            )
        };

        if let Some(cluster) = self.get_mut(label) {
            cluster.propagated_lowest_child_death_level = Some(lowest_death);
        }

        if let Some(parent) = self.get_mut(parent_label) {
            parent.propagated_lowest_child_death_level =
                Some(match parent.propagated_lowest_child_death_level {
                    Some(current) if current <= lowest_death => current,
                    _ => lowest_death,
                });
            parent.propagated_stability += stability;
            parent.propagated_num_constraints_satisfied += constraints;
            parent.propagated_descendants.extend(descendants);
        }
    }

    pub(crate) fn release_virtual_children(&mut self) {
        for cluster in self.clusters.iter_mut().filter_map(Option::as_mut) {
            cluster.release_virtual_child();
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::{Cluster, ClusterSet};
    use crate::error::HdbscanError;

    #[test]
    fn test_detach_points() {
        let mut cluster = Cluster::new(2, Some(1), Some(4.0), 10);
        cluster.detach_points(3, 2.0).unwrap();

        // 3 * (1/2 - 1/4)
        assert!(approx_eq!(f64, cluster.stability(), 0.75));
        assert_eq!(cluster.num_points(), 7);
        assert_eq!(cluster.death_level(), 0.0);

        cluster.detach_points(7, 1.0).unwrap();
        assert_eq!(cluster.num_points(), 0);
        assert_eq!(cluster.death_level(), 1.0);
    }

    #[test]
    fn test_detach_underflow_is_logic_error() {
        let mut cluster = Cluster::new(3, Some(1), Some(4.0), 2);
        let err = cluster.detach_points(5, 1.0).unwrap_err();
        assert_eq!(err, HdbscanError::LogicError { label: 3 });
    }

    #[test]
    fn test_root_detach_at_zero_level_is_infinite() {
        let mut root = Cluster::new(1, None, None, 4);
        root.detach_points(1, 2.0).unwrap();
        assert!(root.stability().is_finite());

        root.detach_points(3, 0.0).unwrap();
        assert!(root.stability().is_infinite());
    }

    #[test]
    fn test_virtual_child() {
        let mut cluster = Cluster::new(2, Some(1), Some(1.0), 5);
        cluster.add_virtual_child_points([4, 1, 1, 9]);
        assert!(cluster.virtual_child_contains_point(1));
        assert!(cluster.virtual_child_contains_point(9));
        assert!(!cluster.virtual_child_contains_point(2));

        cluster.release_virtual_child();
        assert!(!cluster.virtual_child_contains_point(1));
    }

    fn arena_with_two_leaves() -> ClusterSet {
        let mut set = ClusterSet::new();
        set.seed_root(10);
        set.get_mut(1).unwrap().set_has_children();

        let mut left = Cluster::new(2, Some(1), Some(4.0), 5);
        left.detach_points(5, 2.0).unwrap();
        set.push(left);

        let mut right = Cluster::new(3, Some(1), Some(4.0), 5);
        right.detach_points(5, 1.0).unwrap();
        set.push(right);
        set
    }

    #[test]
    fn test_propagate_selects_leaves() {
        let mut set = arena_with_two_leaves();
        assert!(!set.propagate());

        let root = set.get(1).unwrap();
        // Higher labels are examined first.
        assert_eq!(root.propagated_descendants(), &[3, 2]);

        let expected = 5.0 * (1.0 / 2.0 - 1.0 / 4.0) + 5.0 * (1.0 - 1.0 / 4.0);
        assert!(approx_eq!(f64, root.propagated_stability(), expected));
        assert_eq!(root.propagated_lowest_child_death_level(), Some(1.0));
    }

    #[test]
    fn test_propagate_prefers_stable_parent() {
        let mut set = ClusterSet::new();
        set.seed_root(10);
        set.get_mut(1).unwrap().set_has_children();

        // An interior cluster whose own stability beats its children's sum.
        let mut interior = Cluster::new(2, Some(1), Some(10.0), 8);
        interior.detach_points(8, 1.0).unwrap();
        interior.set_has_children();
        set.push(interior);

        let mut left = Cluster::new(3, Some(2), Some(2.0), 4);
        left.detach_points(4, 1.5).unwrap();
        set.push(left);

        let mut right = Cluster::new(4, Some(2), Some(2.0), 4);
        right.detach_points(4, 1.5).unwrap();
        set.push(right);

        assert!(!set.propagate());
        assert_eq!(set.get(1).unwrap().propagated_descendants(), &[2]);
    }

    #[test]
    fn test_propagate_prefers_stronger_children() {
        let mut set = ClusterSet::new();
        set.seed_root(10);
        set.get_mut(1).unwrap().set_has_children();

        // An interior cluster that dies almost as soon as it is born; its
        // children accumulate far more stability than it does.
        let mut interior = Cluster::new(2, Some(1), Some(10.0), 8);
        interior.detach_points(8, 9.0).unwrap();
        interior.set_has_children();
        set.push(interior);

        let mut left = Cluster::new(3, Some(2), Some(9.0), 4);
        left.detach_points(4, 1.0).unwrap();
        set.push(left);

        let mut right = Cluster::new(4, Some(2), Some(9.0), 4);
        right.detach_points(4, 0.5).unwrap();
        set.push(right);

        assert!(!set.propagate());
        assert_eq!(set.get(1).unwrap().propagated_descendants(), &[4, 3]);
        assert_eq!(
            set.get(1).unwrap().propagated_lowest_child_death_level(),
            Some(0.5)
        );
    }

    #[test]
    fn test_propagate_reports_infinite_stability() {
        let mut set = ClusterSet::new();
        set.seed_root(4);
        set.get_mut(1).unwrap().detach_points(4, 0.0).unwrap();
        assert!(set.propagate());
    }
}
