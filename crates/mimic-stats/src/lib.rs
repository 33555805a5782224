//! Small statistical helpers shared by the imitation-learning crates.
//!
//! - [`descriptive`]: summary statistics for a set of fitness values
//! - [`percentiles`]: nearest-rank percentile lookup
//!
//! # Examples
//!
//! ```
//! use mimic_stats::descriptive::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.variance, 2.0);
//! ```
//!
//! ```
//! use mimic_stats::percentiles::percentile;
//!
//! assert_eq!(percentile(&[5.0, 1.0, 3.0, 2.0, 4.0], 50.0), Some(3.0));
//! assert_eq!(percentile(&[], 50.0), None);
//! ```

pub mod descriptive;
pub mod percentiles;

/// Arithmetic mean of a slice, or `None` when it is empty.
///
/// ```
/// assert_eq!(mimic_stats::mean(&[2.0, 4.0]), Some(3.0));
/// assert_eq!(mimic_stats::mean(&[]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}
