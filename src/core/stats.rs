//! Per-cluster distance statistics: extrema of core and intra-cluster
//! distances, moments of their ratios across clusters, a confidence figure
//! per cluster, and a coarse validity score for the whole clustering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::distance::DistanceMatrix;
use crate::utils::helpers;

/// Which of the two per-cluster confidence figures to sort by.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ConfidenceKind {
    Core,
    Intra,
}

/// Distance extrema and confidence for one cluster. The minima ignore
/// zero-valued entries so duplicate points do not pin them to zero.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct DistanceValues {
    pub min_cr: f64,
    pub max_cr: f64,
    pub cr_confidence: f64,
    pub min_dr: f64,
    pub max_dr: f64,
    pub dr_confidence: f64,
}

/// Moments of one ratio vector across clusters.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StatValues {
    pub mean: f64,
    pub max: f64,
    pub variance: f64,
    pub standard_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// Statistics over every cluster's core- and intra-distance ratios.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ClusteringStats {
    pub count: usize,
    pub core_distance_values: StatValues,
    pub intra_distance_values: StatValues,
}

/// Groups point indices in `[begin, end)` by their cluster label.
pub fn create_cluster_map(
    labels: &[usize],
    begin: usize,
    end: usize,
) -> BTreeMap<usize, Vec<usize>> {
    let mut cluster_map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for point in begin..end {
        cluster_map.entry(labels[point]).or_default().push(point);
    }
    cluster_map
}

/// Collects, for every cluster in the map, the extrema of its members' core
/// distances and of its intra-cluster pairwise distances.
pub fn min_max_distances(
    matrix: &DistanceMatrix,
    cluster_map: &BTreeMap<usize, Vec<usize>>,
) -> BTreeMap<usize, DistanceValues> {
    let core = matrix.core_distances();
    let mut distance_map = BTreeMap::new();

    for (&label, indices) in cluster_map {
        let Some(&first) = indices.first() else {
            continue;
        };
        let mut values = DistanceValues {
            min_cr: core[first],
            max_cr: core[first],
            cr_confidence: 0.0,
            min_dr: f64::MAX,
            max_dr: f64::MIN_POSITIVE,
            dr_confidence: 0.0,
        };

        for (position, &index) in indices.iter().enumerate() {
            if position > 0 {
                if values.min_cr > core[index] && core[index] != 0.0 {
                    values.min_cr = core[index];
                }
                if values.max_cr < core[index] {
                    values.max_cr = core[index];
                }
            }

            for &other in &indices[position + 1..] {
                let distance = matrix.get(index, other);
                if values.min_dr > distance && distance != 0.0 {
                    values.min_dr = distance;
                }
                if values.max_dr < distance {
                    values.max_dr = distance;
                }
            }
        }

        distance_map.insert(label, values);
    }

    distance_map
}

/// Sample skewness and excess kurtosis in the spreadsheet form. Both need a
/// minimum number of observations to be defined and are NaN below it.
fn skewness_and_kurtosis(
    count: usize,
    sum_cubes: f64,
    sum_quads: f64,
    standard_dev: f64,
) -> (f64, f64) {
    let n = count as f64;

    let skewness = if count >= 3 {
        (n / ((n - 1.0) * (n - 2.0))) * (sum_cubes / standard_dev.powi(3))
    } else {
        f64::NAN
    };

    let kurtosis = if count >= 4 {
        (n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0))) * (sum_quads / standard_dev.powi(4))
            - 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
    } else {
        f64::NAN
    };

    (skewness, kurtosis)
}

fn stat_values(ratios: &[f64]) -> StatValues {
    let count = ratios.len();
    let mean = helpers::mean(ratios);
    let max = ratios.iter().copied().fold(f64::MIN, f64::max);

    let mut variance = 0.0;
    let mut sum_cubes = 0.0;
    let mut sum_quads = 0.0;
    for &ratio in ratios {
        let deviation = ratio - mean;
        variance += deviation * deviation;
        sum_cubes += deviation.powi(3);
        sum_quads += deviation.powi(4);
    }
    variance /= count as f64 - 1.0;
    let standard_dev = variance.sqrt();

    let (skewness, kurtosis) = skewness_and_kurtosis(count, sum_cubes, sum_quads, standard_dev);

    StatValues {
        mean,
        max,
        variance,
        standard_dev,
        skewness,
        kurtosis,
    }
}

/// Computes the cross-cluster statistics of the two ratio vectors and fills
/// each cluster's confidence as its distance, in percent, below the largest
/// ratio observed.
pub fn calculate_stats(distance_map: &mut BTreeMap<usize, DistanceValues>) -> ClusteringStats {
    let core_ratios: Vec<f64> = distance_map
        .values()
        .map(|values| values.max_cr / values.min_cr)
        .collect();
    let intra_ratios: Vec<f64> = distance_map
        .values()
        .map(|values| values.max_dr / values.min_dr)
        .collect();

    let stats = ClusteringStats {
        count: distance_map.len(),
        core_distance_values: stat_values(&core_ratios),
        intra_distance_values: stat_values(&intra_ratios),
    };

    for (values, (core_ratio, intra_ratio)) in distance_map
        .values_mut()
        .zip(core_ratios.iter().zip(intra_ratios.iter()))
    {
        values.cr_confidence =
            ((stats.core_distance_values.max - core_ratio) / stats.core_distance_values.max) * 100.0;
        values.dr_confidence = ((stats.intra_distance_values.max - intra_ratio)
            / stats.intra_distance_values.max)
            * 100.0;
    }

    stats
}

/// Scores the shape of each ratio distribution: +2 when skewness and
/// kurtosis are both positive, +1 when only the kurtosis is, 0 when only the
/// skewness is, and -1 otherwise; the two dimensions are summed.
pub fn analyse_stats(stats: &ClusteringStats) -> i32 {
    let mut validity = 0;

    for values in [&stats.intra_distance_values, &stats.core_distance_values] {
        let skewness = values.skewness;
        let kurtosis = values.kurtosis;

        validity += if skewness > 0.0 && kurtosis > 0.0 {
            2
        } else if skewness < 0.0 && kurtosis > 0.0 {
            1
        } else if skewness > 0.0 && kurtosis < 0.0 {
            0
        } else {
            -1
        };
    }

    validity
}

/// Sorts cluster labels by how many points each cluster holds, largest
/// first. An empty input list means "all labels in the map".
pub fn sort_by_length(
    cluster_map: &BTreeMap<usize, Vec<usize>>,
    mut clusters: Vec<usize>,
) -> Vec<usize> {
    if clusters.is_empty() {
        clusters = cluster_map.keys().copied().collect();
    }
    let mut lengths: Vec<f64> = clusters
        .iter()
        .map(|label| cluster_map.get(label).map_or(0.0, |list| list.len() as f64))
        .collect();

    helpers::quicksort_paired(&mut clusters, &mut lengths);
    clusters.reverse();
    clusters
}

/// Sorts cluster labels by one of the two confidence figures, ascending.
/// An empty input list means "all labels in the map". The confidences must
/// already have been filled in by [`calculate_stats`].
pub fn sort_by_similarity(
    distance_map: &BTreeMap<usize, DistanceValues>,
    mut clusters: Vec<usize>,
    kind: ConfidenceKind,
) -> Vec<usize> {
    if clusters.is_empty() {
        clusters = distance_map.keys().copied().collect();
    }
    let mut confidences: Vec<f64> = clusters
        .iter()
        .map(|label| {
            distance_map.get(label).map_or(0.0, |values| match kind {
                ConfidenceKind::Core => values.cr_confidence,
                ConfidenceKind::Intra => values.dr_confidence,
            })
        })
        .collect();

    helpers::quicksort_paired(&mut clusters, &mut confidences);
    clusters
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use float_cmp::approx_eq;

    use super::{
        analyse_stats, calculate_stats, create_cluster_map, min_max_distances, sort_by_length,
        sort_by_similarity, ConfidenceKind, DistanceValues,
    };
    use crate::core::distance::{DistanceKind, DistanceMatrix};

    fn ratio_values(ratio: f64) -> DistanceValues {
        DistanceValues {
            min_cr: 1.0,
            max_cr: ratio,
            cr_confidence: 0.0,
            min_dr: 1.0,
            max_dr: ratio,
            dr_confidence: 0.0,
        }
    }

    #[test]
    fn test_create_cluster_map() {
        let labels = vec![2, 0, 2, 3, 3, 3];
        let cluster_map = create_cluster_map(&labels, 0, labels.len());

        assert_eq!(cluster_map[&0], vec![1]);
        assert_eq!(cluster_map[&2], vec![0, 2]);
        assert_eq!(cluster_map[&3], vec![3, 4, 5]);

        let partial = create_cluster_map(&labels, 2, 4);
        assert_eq!(partial[&2], vec![2]);
        assert_eq!(partial[&3], vec![3]);
    }

    #[test]
    fn test_min_max_distances() {
        // Two 1-d clusters: {0, 1} at 0 and 1, {2, 3} at 10 and 12.
        let data: Vec<f64> = vec![0.0, 1.0, 10.0, 12.0];
        let matrix = DistanceMatrix::compute(&data, 4, 1, 1, DistanceKind::Euclidean);
        let cluster_map = create_cluster_map(&[1, 1, 2, 2], 0, 4);
        let distance_map = min_max_distances(&matrix, &cluster_map);

        let first = &distance_map[&1];
        assert!(approx_eq!(f64, first.min_cr, 1.0));
        assert!(approx_eq!(f64, first.max_cr, 1.0));
        assert!(approx_eq!(f64, first.min_dr, 1.0));
        assert!(approx_eq!(f64, first.max_dr, 1.0));

        let second = &distance_map[&2];
        assert!(approx_eq!(f64, second.min_cr, 2.0));
        assert!(approx_eq!(f64, second.max_dr, 2.0));
    }

    #[test]
    fn test_min_ignores_zero_distances() {
        // Points 0 and 1 coincide, so their pair distance and core
        // distances are zero; the minima must skip those.
        let data: Vec<f64> = vec![5.0, 5.0, 7.0];
        let matrix = DistanceMatrix::compute(&data, 3, 1, 1, DistanceKind::Euclidean);
        let cluster_map = create_cluster_map(&[1, 1, 1], 0, 3);
        let distance_map = min_max_distances(&matrix, &cluster_map);

        let values = &distance_map[&1];
        assert!(approx_eq!(f64, values.min_dr, 2.0));
        assert!(approx_eq!(f64, values.max_dr, 2.0));
        assert!(approx_eq!(f64, values.max_cr, 2.0));
    }

    #[test]
    fn test_calculate_stats() {
        // Ratio vectors [1, 2, 3, 10] in both dimensions.
        let mut distance_map: BTreeMap<usize, DistanceValues> = [1.0, 2.0, 3.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &ratio)| (i + 2, ratio_values(ratio)))
            .collect();

        let stats = calculate_stats(&mut distance_map);
        assert_eq!(stats.count, 4);

        let values = stats.core_distance_values;
        assert!(approx_eq!(f64, values.mean, 4.0));
        assert!(approx_eq!(f64, values.max, 10.0));
        assert!(approx_eq!(f64, values.variance, 50.0 / 3.0));
        assert!(approx_eq!(f64, values.standard_dev, (50.0_f64 / 3.0).sqrt()));
        assert!(approx_eq!(f64, values.skewness, 1.763_635, epsilon = 1e-4));
        assert!(approx_eq!(f64, values.kurtosis, 3.228, epsilon = 1e-4));

        // Skewed right with heavy tails in both dimensions.
        assert_eq!(analyse_stats(&stats), 4);

        // Confidence is the percentage below the worst ratio.
        assert!(approx_eq!(f64, distance_map[&2].cr_confidence, 90.0));
        assert!(approx_eq!(f64, distance_map[&5].cr_confidence, 0.0));
    }

    #[test]
    fn test_stats_small_counts_are_nan() {
        let mut distance_map: BTreeMap<usize, DistanceValues> =
            [(2, ratio_values(1.0)), (3, ratio_values(2.0))]
                .into_iter()
                .collect();
        let stats = calculate_stats(&mut distance_map);

        assert_eq!(stats.count, 2);
        assert!(stats.core_distance_values.skewness.is_nan());
        assert!(stats.core_distance_values.kurtosis.is_nan());
        assert_eq!(analyse_stats(&stats), -2);
    }

    #[test]
    fn test_stats_serialize_round_trip() {
        let mut distance_map: BTreeMap<usize, DistanceValues> = [1.0, 2.0, 3.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &ratio)| (i + 2, ratio_values(ratio)))
            .collect();
        let stats = calculate_stats(&mut distance_map);

        let serialized = serde_json::to_string(&stats).unwrap();
        let deserialized: super::ClusteringStats = serde_json::from_str(&serialized).unwrap();
        assert_eq!(stats, deserialized);
    }

    #[test]
    fn test_sort_by_length() {
        let labels = vec![2, 3, 3, 3, 4, 4, 0];
        let cluster_map = create_cluster_map(&labels, 0, labels.len());

        let sorted = sort_by_length(&cluster_map, Vec::new());
        assert_eq!(sorted[..2], [3, 4]);
        let mut tail = sorted[2..].to_vec();
        tail.sort_unstable();
        assert_eq!(tail, vec![0, 2]);

        let subset = sort_by_length(&cluster_map, vec![2, 3]);
        assert_eq!(subset, vec![3, 2]);
    }

    #[test]
    fn test_sort_by_similarity() {
        let mut distance_map: BTreeMap<usize, DistanceValues> = [1.0, 4.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, &ratio)| (i + 2, ratio_values(ratio)))
            .collect();
        calculate_stats(&mut distance_map);

        // The worst ratio gets confidence 0 and sorts first.
        let sorted = sort_by_similarity(&distance_map, Vec::new(), ConfidenceKind::Core);
        assert_eq!(sorted, vec![3, 4, 2]);

        let intra = sort_by_similarity(&distance_map, Vec::new(), ConfidenceKind::Intra);
        assert_eq!(intra, sorted);
    }
}
