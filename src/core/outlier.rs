//! Per-point outlier scores derived from the level at which each point
//! turned to noise.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::cluster::ClusterSet;

/// The outlier score of a single point. Scores sort ascending by score,
/// then core distance, then point id.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct OutlierScore {
    pub id: usize,
    pub score: f64,
    pub core_distance: f64,
}

impl OutlierScore {
    pub fn new(id: usize, score: f64, core_distance: f64) -> Self {
        OutlierScore {
            id,
            score,
            core_distance,
        }
    }

    /// The lexicographic ordering used for the sorted score sequence.
    pub fn ordering(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.core_distance.total_cmp(&other.core_distance))
            .then(self.id.cmp(&other.id))
    }
}

/// Scores every point as `1 - eps_max / eps`, where `eps` is the level at
/// which the point became noise and `eps_max` the lowest death level among
/// the descendants of the cluster it last belonged to. A point that never
/// rose above density zero scores 0.
pub(crate) fn calculate_outlier_scores(
    clusters: &ClusterSet,
    point_noise_levels: &[f64],
    point_last_clusters: &[usize],
    core_distances: &[f64],
) -> Vec<OutlierScore> {
    let mut scores: Vec<OutlierScore> = point_noise_levels
        .iter()
        .zip(point_last_clusters.iter())
        .enumerate()
        .map(|(id, (&epsilon, &last_cluster))| {
            let epsilon_max = clusters
                .get(last_cluster)
                .and_then(|cluster| cluster.propagated_lowest_child_death_level())
                .unwrap_or(f64::MAX);
            let score = if epsilon != 0.0 {
                1.0 - epsilon_max / epsilon
            } else {
                0.0
            };
            OutlierScore::new(id, score, core_distances[id])
        })
        .collect();

    scores.sort_unstable_by(OutlierScore::ordering);
    scores
}
