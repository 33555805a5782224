//! Frame quality scoring.
//!
//! Quality decides both whether a frame is recorded at all and how
//! strongly it pulls on the learned weights. The heuristics are task
//! specific, so they sit behind the [`QualityScorer`] trait; the recorder
//! clamps whatever a scorer returns into `[0.1, 5.0]`.

use std::fmt;

use crate::demonstration::{ACTION_ACTIVE, action, sensor};

pub trait QualityScorer: fmt::Debug {
    /// Scores one `(sensors, actions)` pair. The result is clamped by the
    /// caller.
    fn score(&self, sensors: &[f32], actions: &[f32]) -> f32;
}

/// Scorer for the obstacle course task.
///
/// Starts from a neutral `1.0` and adjusts it:
///
/// | Situation | Adjustment |
/// |---|---|
/// | obstacle close ahead and the operator jumps or turns | `+obstacle_bonus` |
/// | checkpoint close and the operator moves forward | `+checkpoint_bonus` |
/// | hazard close and the operator walks into it without jumping | `-hazard_penalty` |
/// | no action pressed at all | `-idle_penalty` |
#[derive(Debug, Clone)]
pub struct DefaultQualityScorer {
    /// Center ray distance below which an obstacle counts as close.
    pub obstacle_distance: f32,
    /// Proximity reading above which a checkpoint or hazard counts as close.
    pub proximity: f32,
    pub obstacle_bonus: f32,
    pub checkpoint_bonus: f32,
    pub hazard_penalty: f32,
    pub idle_penalty: f32,
}

impl Default for DefaultQualityScorer {
    fn default() -> Self {
        Self {
            obstacle_distance: 0.3,
            proximity: 0.7,
            obstacle_bonus: 1.0,
            checkpoint_bonus: 0.5,
            hazard_penalty: 0.7,
            idle_penalty: 0.5,
        }
    }
}

impl QualityScorer for DefaultQualityScorer {
    fn score(&self, sensors: &[f32], actions: &[f32]) -> f32 {
        let reading = |i: usize| sensors.get(i).copied().unwrap_or(0.0);
        let pressed = |i: usize| actions.get(i).is_some_and(|&a| a > ACTION_ACTIVE);

        let forward = pressed(action::FORWARD);
        let turning = pressed(action::TURN_LEFT) || pressed(action::TURN_RIGHT);
        let jumping = pressed(action::JUMP);

        let mut quality = 1.0;
        if sensors.len() > sensor::RAY_CENTER
            && reading(sensor::RAY_CENTER) < self.obstacle_distance
            && (jumping || turning)
        {
            quality += self.obstacle_bonus;
        }
        if reading(sensor::CHECKPOINT_PROXIMITY) > self.proximity && forward {
            quality += self.checkpoint_bonus;
        }
        if reading(sensor::HAZARD_PROXIMITY) > self.proximity && forward && !jumping {
            quality -= self.hazard_penalty;
        }
        if actions.iter().all(|&a| a < 0.1) {
            quality -= self.idle_penalty;
        }
        quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensors(center: f32, checkpoint: f32, hazard: f32) -> Vec<f32> {
        vec![1.0, 1.0, center, 1.0, 1.0, 0.0, checkpoint, hazard]
    }

    #[test]
    fn test_neutral_forward() {
        let s = DefaultQualityScorer::default();
        assert_eq!(s.score(&sensors(1.0, 0.0, 0.0), &[1.0, 0.0, 0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_jump_near_obstacle_is_rewarded() {
        let s = DefaultQualityScorer::default();
        assert_eq!(s.score(&sensors(0.1, 0.0, 0.0), &[1.0, 0.0, 0.0, 1.0]), 2.0);
        assert_eq!(s.score(&sensors(0.1, 0.0, 0.0), &[0.0, 1.0, 0.0, 0.0]), 2.0);
    }

    #[test]
    fn test_walking_into_hazard_is_penalized() {
        let s = DefaultQualityScorer::default();
        let q = s.score(&sensors(1.0, 0.0, 0.9), &[1.0, 0.0, 0.0, 0.0]);
        assert!((q - 0.3).abs() < 1e-6);
        let jumped = s.score(&sensors(1.0, 0.0, 0.9), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(jumped, 1.0);
    }

    #[test]
    fn test_checkpoint_and_idle() {
        let s = DefaultQualityScorer::default();
        assert_eq!(s.score(&sensors(1.0, 0.9, 0.0), &[1.0, 0.0, 0.0, 0.0]), 1.5);
        assert_eq!(s.score(&sensors(1.0, 0.0, 0.0), &[0.0, 0.0, 0.0, 0.0]), 0.5);
    }
}
