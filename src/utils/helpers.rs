//! Utility functions shared across the clustering pipeline.

/// Returns the mean of the given values.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Returns the permutation that sorts `values` ascending. Ties are broken by
/// the original index, so the result is deterministic.
pub fn argsort(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_unstable_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    order
}

/// Sorts `data` ascending with a Lomuto-partition quicksort, applying the
/// same permutation to `keys`.
pub fn quicksort_paired(keys: &mut [usize], data: &mut [f64]) {
    debug_assert_eq!(keys.len(), data.len());
    if data.len() < 2 {
        return;
    }

    let last = data.len() - 1;
    let pivot = data[last];
    let mut low = 0;
    for i in 0..last {
        if data[i] < pivot {
            data.swap(i, low);
            keys.swap(i, low);
            low += 1;
        }
    }
    data.swap(low, last);
    keys.swap(low, last);

    let (keys_left, keys_right) = keys.split_at_mut(low);
    let (data_left, data_right) = data.split_at_mut(low);
    quicksort_paired(keys_left, data_left);
    quicksort_paired(&mut keys_right[1..], &mut data_right[1..]);
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    #[test]
    fn test_mean() {
        assert!(approx_eq!(f64, super::mean(&[1.0, 2.0, 3.0, 4.0]), 2.5));
    }

    #[test]
    fn test_argsort() {
        let order = super::argsort(&[3.0, 1.0, 2.0, 1.0]);
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_quicksort_paired() {
        let mut keys = vec![10, 20, 30, 40, 50];
        let mut data = vec![5.0, 1.0, 4.0, 1.0, 3.0];
        super::quicksort_paired(&mut keys, &mut data);

        assert_eq!(data, vec![1.0, 1.0, 3.0, 4.0, 5.0]);
        assert_eq!(keys[2..], [50, 30, 10]);
        let mut front = keys[..2].to_vec();
        front.sort_unstable();
        assert_eq!(front, vec![20, 40]);
    }

    #[test]
    fn test_quicksort_paired_short() {
        let mut keys = vec![7];
        let mut data = vec![0.5];
        super::quicksort_paired(&mut keys, &mut data);
        assert_eq!(keys, vec![7]);
    }
}
