//! Detection of evolutionary plateaus.
//!
//! The tracker is fed the best fitness of every generation and keeps the
//! most recent `capacity` values. From that window it derives a
//! stagnation score in `[0, 1]`: a weighted sum of
//!
//! | Factor | Weight | Value |
//! |---|---|---|
//! | time without improvement | 0.5 | `min(generations_without_improvement / 10, 1)` |
//! | low variability | 0.3 | `1 - min(variance / mean², 0.5)` |
//! | declining trend | 0.2 | `max(0, (avg(first 3) - avg(last 3)) / avg(first 3))`, 5+ samples |
//!
//! Fewer than three samples always score `0`.

use std::collections::VecDeque;

use mimic_stats::descriptive::DescriptiveStats;

const MIN_SAMPLES: usize = 3;
const TREND_MIN_SAMPLES: usize = 5;
const SATURATION_GENERATIONS: f32 = 10.0;
const WEIGHT_IMPROVEMENT: f32 = 0.5;
const WEIGHT_VARIABILITY: f32 = 0.3;
const WEIGHT_TREND: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct FitnessTracker {
    capacity: usize,
    epsilon: f32,
    window: VecDeque<f32>,
    last_best: f32,
    generations_without_improvement: usize,
    improvement_rate: f32,
    stagnation_score: f32,
}

impl FitnessTracker {
    /// Creates a tracker keeping `capacity` samples, where an improvement
    /// must beat the previous best by more than `epsilon`.
    #[must_use]
    pub fn new(capacity: usize, epsilon: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            epsilon,
            window: VecDeque::with_capacity(capacity),
            last_best: 0.0,
            generations_without_improvement: 0,
            improvement_rate: 0.0,
            stagnation_score: 0.0,
        }
    }

    /// Records the best fitness of the generation that just ended.
    pub fn update(&mut self, current_best: f32) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(current_best);

        if current_best > self.last_best + self.epsilon {
            self.improvement_rate = (current_best - self.last_best) / self.last_best.max(1.0);
            self.generations_without_improvement = 0;
        } else {
            self.improvement_rate = 0.0;
            self.generations_without_improvement += 1;
        }
        self.last_best = self.last_best.max(current_best);

        self.stagnation_score = stagnation_score(
            self.window.make_contiguous(),
            self.generations_without_improvement,
        );
    }

    #[must_use]
    pub fn stagnation_score(&self) -> f32 {
        self.stagnation_score
    }

    #[must_use]
    pub fn is_stagnating(&self, threshold: f32) -> bool {
        self.stagnation_score > threshold
    }

    #[must_use]
    pub fn has_significant_improvement(&self, threshold: f32) -> bool {
        self.improvement_rate > threshold
    }

    /// Whether the average of the last three samples dropped by more than
    /// `threshold` (relative) compared to the three samples before them.
    #[must_use]
    pub fn is_declining(&self, threshold: f32) -> bool {
        let n = self.window.len();
        if n < 6 {
            return false;
        }
        let avg = |range: std::ops::Range<usize>| range.map(|i| self.window[i]).sum::<f32>() / 3.0;
        let prior = avg(n - 6..n - 3);
        let recent = avg(n - 3..n);
        prior > f32::EPSILON && (prior - recent) / prior > threshold
    }

    #[must_use]
    pub fn window(&self) -> &VecDeque<f32> {
        &self.window
    }

    #[must_use]
    pub fn last_best(&self) -> f32 {
        self.last_best
    }

    #[must_use]
    pub fn generations_without_improvement(&self) -> usize {
        self.generations_without_improvement
    }

    #[must_use]
    pub fn improvement_rate(&self) -> f32 {
        self.improvement_rate
    }
}

/// Stagnation score of a fitness window, oldest sample first.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn stagnation_score(window: &[f32], generations_without_improvement: usize) -> f32 {
    if window.len() < MIN_SAMPLES {
        return 0.0;
    }
    let Some(stats) = DescriptiveStats::new(window.iter().copied()) else {
        return 0.0;
    };

    let improvement_factor =
        (generations_without_improvement as f32 / SATURATION_GENERATIONS).min(1.0);

    let mean_sq = stats.mean * stats.mean;
    let relative_variance = if mean_sq <= f32::EPSILON {
        if stats.variance <= f32::EPSILON { 0.0 } else { 0.5 }
    } else {
        stats.variance / mean_sq
    };
    let variability_factor = 1.0 - relative_variance.min(0.5);

    let trend_factor = if window.len() >= TREND_MIN_SAMPLES {
        let first = window[..3].iter().sum::<f32>() / 3.0;
        let last = window[window.len() - 3..].iter().sum::<f32>() / 3.0;
        if first > f32::EPSILON {
            ((first - last) / first).clamp(0.0, 1.0)
        } else {
            0.0
        }
    } else {
        0.0
    };

    (WEIGHT_IMPROVEMENT * improvement_factor
        + WEIGHT_VARIABILITY * variability_factor
        + WEIGHT_TREND * trend_factor)
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_three_samples() {
        assert_eq!(stagnation_score(&[10.0, 10.0], 20), 0.0);
        let mut tracker = FitnessTracker::new(10, 0.5);
        tracker.update(10.0);
        tracker.update(10.0);
        assert_eq!(tracker.stagnation_score(), 0.0);
    }

    #[test]
    fn test_flat_window_scores_variability() {
        let score = stagnation_score(&[10.0; 5], 0);
        assert!(score >= 0.3 - 1e-6, "{score}");
        assert!((score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_monotonic_in_generations_without_improvement() {
        let window = [10.0, 12.0, 11.0, 13.0, 12.0];
        let mut previous = 0.0;
        for g in 0..=15 {
            let score = stagnation_score(&window, g);
            assert!(score >= previous);
            previous = score;
        }
        assert_eq!(stagnation_score(&window, 10), stagnation_score(&window, 15));
        let saturated = stagnation_score(&window, 10);
        let base = stagnation_score(&window, 0);
        assert!((saturated - base - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_declining_trend_raises_score() {
        let flat = stagnation_score(&[20.0, 20.0, 20.0, 20.0, 20.0], 0);
        let falling = stagnation_score(&[20.0, 20.0, 20.0, 10.0, 10.0], 0);
        // the falling window has more variance but a trend component
        let expected_trend = 0.2 * ((20.0 - 40.0 / 3.0) / 20.0);
        let stats = DescriptiveStats::new([20.0, 20.0, 20.0, 10.0, 10.0]).unwrap();
        let expected_var = 0.3 * (1.0 - (stats.variance / (stats.mean * stats.mean)).min(0.5));
        assert!((falling - (expected_trend + expected_var)).abs() < 1e-5);
        assert!((flat - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_update_tracks_improvement() {
        let mut tracker = FitnessTracker::new(5, 0.5);
        tracker.update(10.0);
        assert_eq!(tracker.generations_without_improvement(), 0);
        assert!((tracker.improvement_rate() - 10.0).abs() < 1e-6);

        tracker.update(10.3);
        assert_eq!(tracker.generations_without_improvement(), 1);
        assert_eq!(tracker.improvement_rate(), 0.0);
        assert_eq!(tracker.last_best(), 10.3);

        tracker.update(15.3);
        assert_eq!(tracker.generations_without_improvement(), 0);
        assert!((tracker.improvement_rate() - 5.0 / 10.3).abs() < 1e-6);
        assert!(tracker.has_significant_improvement(0.1));

        tracker.update(4.0);
        assert_eq!(tracker.last_best(), 15.3);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut tracker = FitnessTracker::new(3, 0.5);
        for f in [1.0, 2.0, 3.0, 4.0, 5.0] {
            tracker.update(f);
        }
        assert_eq!(tracker.window().iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);

        // wrapped ring buffer is scored oldest first
        for f in [9.0, 2.0] {
            tracker.update(f);
        }
        let expected = stagnation_score(&[5.0, 9.0, 2.0], 1);
        assert!((tracker.stagnation_score() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_stagnating_after_long_plateau() {
        let mut tracker = FitnessTracker::new(10, 0.5);
        for _ in 0..12 {
            tracker.update(50.0);
        }
        assert_eq!(tracker.generations_without_improvement(), 11);
        assert!((tracker.stagnation_score() - 0.8).abs() < 1e-6);
        assert!(tracker.is_stagnating(0.6));
    }

    #[test]
    fn test_declining() {
        let mut tracker = FitnessTracker::new(10, 0.5);
        for f in [30.0, 30.0, 30.0, 28.0, 27.0, 27.0] {
            tracker.update(f);
        }
        assert!(tracker.is_declining(0.05));
        assert!(!tracker.is_declining(0.2));
    }
}
