//! Scripted stand-in for a human operator.
//!
//! The expert follows the ring, jumps low obstacles and hazards and steers
//! around tall obstacles. The operator adds Gaussian noise on top, so that
//! recorded sessions look like imperfect human play.

use mimic_imitation::demonstration::{action, sensor};
use rand::Rng;
use rand_distr::{Distribution as _, Normal};

use crate::course::{Controller, JUMP_CLEARANCE, MAX_OBSTACLE_HEIGHT, Run, TURN_RATE, wrap_angle};

/// Center ray reading below which the expert reacts to an obstacle.
const REACT_DISTANCE: f32 = 0.25;
/// Hazard proximity above which the expert jumps.
const HAZARD_JUMP: f32 = 0.9;
const AVOID_TURN: f32 = 0.6;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExpertController;

impl Controller for ExpertController {
    fn act(&mut self, run: &Run<'_>, sensors: &[f32]) -> Vec<f32> {
        let reading = |i: usize| sensors.get(i).copied().unwrap_or(0.0);
        let mut desired = run.track_heading();
        let mut jump = 0.0;

        let height = reading(sensor::OBSTACLE_HEIGHT) * MAX_OBSTACLE_HEIGHT;
        if reading(sensor::RAY_CENTER) < REACT_DISTANCE && height > 0.0 {
            if height <= JUMP_CLEARANCE {
                jump = 1.0;
            } else {
                let left = reading(0).max(reading(1));
                let right = reading(3).max(reading(4));
                let side = if left >= right { AVOID_TURN } else { -AVOID_TURN };
                desired = run.heading() + side;
            }
        }
        if reading(sensor::HAZARD_PROXIMITY) > HAZARD_JUMP {
            jump = 1.0;
        }

        let turn = wrap_angle(desired - run.heading()) / TURN_RATE;
        let mut actions = vec![0.0; action::WIDTH];
        actions[action::FORWARD] = 1.0;
        actions[action::TURN_LEFT] = turn.clamp(0.0, 1.0);
        actions[action::TURN_RIGHT] = (-turn).clamp(0.0, 1.0);
        actions[action::JUMP] = jump;
        actions
    }
}

/// The expert with per-action Gaussian noise.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedOperator<R> {
    expert: ExpertController,
    noise: Option<Normal<f32>>,
    rng: R,
}

impl<R> ScriptedOperator<R>
where
    R: Rng,
{
    /// A non-positive or non-finite `noise` gives a noiseless operator.
    pub fn new(noise: f32, rng: R) -> Self {
        let noise = (noise > 0.0).then(|| Normal::new(0.0, noise).ok()).flatten();
        Self {
            expert: ExpertController,
            noise,
            rng,
        }
    }
}

impl<R> Controller for ScriptedOperator<R>
where
    R: Rng,
{
    fn act(&mut self, run: &Run<'_>, sensors: &[f32]) -> Vec<f32> {
        let mut actions = self.expert.act(run, sensors);
        if let Some(noise) = &self.noise {
            for a in &mut actions {
                *a = (*a + noise.sample(&mut self.rng)).clamp(0.0, 1.0);
            }
        }
        actions
    }
}
