//! Must-link / cannot-link constraints over point pairs.
//!
//! The data model is in place and the propagation tie-breaks consult the
//! satisfaction counters, but no constraint engine populates them yet; a
//! future engine can do so without touching the clustering core.

use serde::{Deserialize, Serialize};

/// The two kinds of pairwise constraint.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ConstraintKind {
    MustLink,
    CannotLink,
}

/// A semi-supervised hint that two points must or must not share a cluster.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Constraint {
    point_a: usize,
    point_b: usize,
    kind: ConstraintKind,
}

impl Constraint {
    pub fn new(point_a: usize, point_b: usize, kind: ConstraintKind) -> Self {
        Constraint {
            point_a,
            point_b,
            kind,
        }
    }

    pub fn point_a(&self) -> usize {
        self.point_a
    }

    pub fn point_b(&self) -> usize {
        self.point_b
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }
}
