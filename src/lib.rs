//! HDBSCAN*: hierarchical density-based clustering.
//!
//! Given `N` points in `d`-dimensional space and a density parameter
//! `min_points`, this crate produces a condensed cluster hierarchy indexed by
//! a monotonically decreasing density threshold, a flat partition of points
//! into the most stable clusters plus noise, and per-point outlier scores
//! along with per-cluster quality statistics.
//!
//! The pipeline is: pairwise distance matrix → core distances →
//! mutual-reachability minimum spanning tree → hierarchy construction by edge
//! removal → stability propagation → prominent-cluster selection → stats.
//!
//! ```
//! use hdbscan::Hdbscan;
//!
//! let data: Vec<f64> = vec![
//!     0.0, 0.0, 0.0, 1.0, 1.0, 0.0, // one tight group
//!     10.0, 10.0, 10.0, 11.0, 11.0, 10.0, // another, far away
//! ];
//!
//! let mut scan = Hdbscan::new(2).unwrap();
//! scan.run(&data, 6, 2, true).unwrap();
//!
//! assert_eq!(scan.labels().len(), 6);
//! ```

mod core;
mod error;

pub mod utils;

pub use crate::core::cluster::{Cluster, ClusterSet};
pub use crate::core::constraint::{Constraint, ConstraintKind};
pub use crate::core::distance::{DistanceKind, DistanceMatrix};
pub use crate::core::graph::UndirectedGraph;
pub use crate::core::hdbscan::Hdbscan;
pub use crate::core::hierarchy::HierarchyEntry;
pub use crate::core::outlier::OutlierScore;
pub use crate::core::number::Number;
pub use crate::core::stats;
pub use crate::core::stats::{ClusteringStats, ConfidenceKind, DistanceValues, StatValues};
pub use error::{HdbscanError, Result};
