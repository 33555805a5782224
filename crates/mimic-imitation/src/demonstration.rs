//! Recorded human demonstrations.
//!
//! A [`DemonstrationSession`] is what a human operator leaves behind after
//! controlling an agent for a while: a sequence of [`DemonstrationFrame`]s
//! plus the fitness the controlled agent reached. Sessions serialize to the
//! JSON layout below, one file per session:
//!
//! ```json
//! {
//!   "sessionName": "demo_20260101_120000",
//!   "timestamp": "2026-01-01T12:00:00Z",
//!   "totalFitness": 42.5,
//!   "sessionDuration": 31.2,
//!   "frames": [
//!     { "sensorInputs": [1.0, 0.8, ...], "humanActions": [1.0, 0.0, 0.0, 0.0],
//!       "frameQuality": 1.5, "timestamp": 0.25 }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index of each action in an action vector.
pub mod action {
    pub const FORWARD: usize = 0;
    pub const TURN_LEFT: usize = 1;
    pub const TURN_RIGHT: usize = 2;
    pub const JUMP: usize = 3;
    pub const WIDTH: usize = 4;
}

/// Index of each reading in a sensor vector.
pub mod sensor {
    /// Ray distances from far-left to far-right, `1.0` meaning clear.
    pub const RAYS: std::ops::Range<usize> = 0..5;
    pub const RAY_CENTER: usize = 2;
    pub const OBSTACLE_HEIGHT: usize = 5;
    pub const CHECKPOINT_PROXIMITY: usize = 6;
    pub const HAZARD_PROXIMITY: usize = 7;
    pub const WIDTH: usize = 8;
}

pub const MIN_FRAME_QUALITY: f32 = 0.1;
pub const MAX_FRAME_QUALITY: f32 = 5.0;

/// Action values above this count as "pressed".
pub const ACTION_ACTIVE: f32 = 0.5;

/// One tick of input handed in by the sensor collaborator while a human
/// controls an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    pub sensors: Vec<f32>,
    pub actions: Vec<f32>,
    /// World position of the controlled agent.
    pub position: [f32; 3],
    /// Seconds since the simulation started.
    pub timestamp: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemonstrationFrame {
    pub sensor_inputs: Vec<f32>,
    pub human_actions: Vec<f32>,
    pub frame_quality: f32,
    /// Seconds since the session started.
    pub timestamp: f32,
}

impl DemonstrationFrame {
    #[must_use]
    pub fn new(sensor_inputs: Vec<f32>, human_actions: Vec<f32>, quality: f32, timestamp: f32) -> Self {
        Self {
            sensor_inputs,
            human_actions,
            frame_quality: quality.clamp(MIN_FRAME_QUALITY, MAX_FRAME_QUALITY),
            timestamp,
        }
    }

    #[must_use]
    pub fn action(&self, index: usize) -> f32 {
        self.human_actions.get(index).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn is_jumping(&self) -> bool {
        self.action(action::JUMP) > ACTION_ACTIVE
    }

    fn is_well_formed(&self) -> bool {
        !self.sensor_inputs.is_empty()
            && !self.human_actions.is_empty()
            && self.sensor_inputs.iter().all(|v| v.is_finite())
            && self.human_actions.iter().all(|v| v.is_finite())
            && self.frame_quality.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemonstrationSession {
    pub session_name: String,
    /// When recording started.
    pub timestamp: DateTime<Utc>,
    /// Fitness of the human-controlled agent when recording stopped.
    pub total_fitness: f32,
    /// Seconds between the first and the last sample of the session.
    pub session_duration: f32,
    pub frames: Vec<DemonstrationFrame>,
}

impl DemonstrationSession {
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Repairs a session read from storage.
    ///
    /// Frames with non-finite values or widths differing from the first
    /// frame are dropped and qualities are clamped back into range. Returns
    /// `None` when nothing usable remains.
    #[must_use]
    pub fn sanitized(mut self) -> Option<Self> {
        if !self.total_fitness.is_finite() {
            return None;
        }
        self.frames.retain(DemonstrationFrame::is_well_formed);
        let (sensor_width, action_width) = self
            .frames
            .first()
            .map(|f| (f.sensor_inputs.len(), f.human_actions.len()))?;
        self.frames.retain(|f| {
            f.sensor_inputs.len() == sensor_width && f.human_actions.len() == action_width
        });
        for frame in &mut self.frames {
            frame.frame_quality = frame
                .frame_quality
                .clamp(MIN_FRAME_QUALITY, MAX_FRAME_QUALITY);
        }
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(frames: Vec<DemonstrationFrame>) -> DemonstrationSession {
        DemonstrationSession {
            session_name: "s".to_owned(),
            timestamp: DateTime::UNIX_EPOCH,
            total_fitness: 1.0,
            session_duration: 0.0,
            frames,
        }
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(DemonstrationFrame::new(vec![], vec![], 9.0, 0.0).frame_quality, 5.0);
        assert_eq!(DemonstrationFrame::new(vec![], vec![], -1.0, 0.0).frame_quality, 0.1);
    }

    #[test]
    fn test_json_field_names() {
        let s = session(vec![DemonstrationFrame::new(vec![0.5], vec![1.0], 1.0, 0.25)]);
        let json = serde_json::to_value(&s).unwrap();
        for key in ["sessionName", "timestamp", "totalFitness", "sessionDuration", "frames"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        let frame = &json["frames"][0];
        for key in ["sensorInputs", "humanActions", "frameQuality", "timestamp"] {
            assert!(frame.get(key).is_some(), "missing frame {key}");
        }
    }

    #[test]
    fn test_sanitized_drops_bad_frames() {
        let mut bad_quality = DemonstrationFrame::new(vec![0.1, 0.2], vec![1.0], 1.0, 0.0);
        bad_quality.frame_quality = 12.0;
        let s = session(vec![
            DemonstrationFrame::new(vec![f32::NAN, 0.0], vec![1.0], 1.0, 0.0),
            bad_quality,
            DemonstrationFrame::new(vec![0.1], vec![1.0], 1.0, 0.1),
        ])
        .sanitized()
        .unwrap();
        assert_eq!(s.frame_count(), 1);
        assert_eq!(s.frames[0].frame_quality, MAX_FRAME_QUALITY);
    }

    #[test]
    fn test_sanitized_rejects_empty() {
        assert!(session(vec![]).sanitized().is_none());
    }
}
