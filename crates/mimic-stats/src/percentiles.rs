/// Computes a single percentile value from sorted data.
///
/// Uses the nearest-rank method: for `n` values the `k`-th percentile is
/// the value at position `floor(n * k / 100)`, clamped to the last index.
///
/// Returns `None` if the input is empty.
///
/// # Examples
///
/// ```
/// use mimic_stats::percentiles::compute_percentile;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_percentile(&values, 25.0), Some(2.0));
/// assert_eq!(compute_percentile(&values, 100.0), Some(5.0));
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f32], percentile: f32) -> Option<f32> {
    debug_assert!(
        sorted_values.is_sorted_by(|a, b| a <= b),
        "values must be sorted in ascending order"
    );
    if sorted_values.is_empty() {
        return None;
    }
    let percentile = percentile.clamp(0.0, 100.0);
    let idx = ((sorted_values.len() as f32 * percentile) / 100.0) as usize;
    let idx = idx.min(sorted_values.len() - 1);
    Some(sorted_values[idx])
}

/// Computes a percentile from unsorted values.
#[must_use]
pub fn percentile(values: &[f32], percentile: f32) -> Option<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    compute_percentile(&sorted, percentile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_rank() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        assert_eq!(compute_percentile(&values, 0.0), Some(10.0));
        assert_eq!(compute_percentile(&values, 50.0), Some(60.0));
        assert_eq!(compute_percentile(&values, 75.0), Some(80.0));
        assert_eq!(compute_percentile(&values, 150.0), Some(100.0));
    }

    #[test]
    fn test_unsorted_input() {
        assert_eq!(percentile(&[3.0, 1.0, 2.0], 0.0), Some(1.0));
        assert_eq!(percentile(&[], 90.0), None);
    }
}
