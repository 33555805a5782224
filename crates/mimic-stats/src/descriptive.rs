/// Descriptive statistics summarizing a dataset.
///
/// Variance is the population variance (divided by `n`), which is what the
/// stagnation and diversity heuristics are defined over.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    /// Number of samples.
    pub count: usize,
    /// The minimum value in the dataset.
    pub min: f32,
    /// The maximum value in the dataset.
    pub max: f32,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f32,
    /// The median value of the dataset.
    pub median: f32,
    /// The population variance of the dataset.
    pub variance: f32,
    /// The standard deviation of the dataset.
    pub std_dev: f32,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// Returns `None` if the dataset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mimic_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([5.0, 2.0, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f32::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted values.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f32]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let count = sorted_values.len();
        let n = count as f32;
        let mean = sorted_values.iter().sum::<f32>() / n;
        let median = sorted_values[count / 2];
        let variance = sorted_values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f32>()
            / n;

        Some(Self {
            count,
            min,
            max,
            mean,
            median,
            variance,
            std_dev: variance.sqrt(),
        })
    }

    /// Ratio of standard deviation to the magnitude of the mean.
    ///
    /// A mean of (almost) zero makes the ratio meaningless; in that case the
    /// population is reported as fully uniform when it has no spread and as
    /// maximally varied otherwise.
    ///
    /// ```
    /// # use mimic_stats::descriptive::DescriptiveStats;
    /// let flat = DescriptiveStats::new([4.0, 4.0, 4.0]).unwrap();
    /// assert_eq!(flat.coefficient_of_variation(), 0.0);
    /// ```
    #[must_use]
    pub fn coefficient_of_variation(&self) -> f32 {
        if self.mean.abs() <= f32::EPSILON {
            if self.std_dev <= f32::EPSILON {
                0.0
            } else {
                f32::INFINITY
            }
        } else {
            self.std_dev / self.mean.abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_returns_none() {
        assert!(DescriptiveStats::new(std::iter::empty()).is_none());
    }

    #[test]
    fn test_population_variance() {
        let stats = DescriptiveStats::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-6);
        assert!((stats.variance - 4.0).abs() < 1e-6);
        assert!((stats.std_dev - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_coefficient_of_variation() {
        let stats = DescriptiveStats::new([8.0, 12.0]).unwrap();
        assert!((stats.coefficient_of_variation() - 0.2).abs() < 1e-6);

        let zero_mean = DescriptiveStats::new([-1.0, 1.0]).unwrap();
        assert!(zero_mean.coefficient_of_variation().is_infinite());
    }
}
