//! Turns a live stream of operator samples into a demonstration session.
//!
//! Most ticks of human control carry little information: the operator
//! stands still, or repeats what they did a frame ago. The recorder keeps
//! a frame only when all three filters pass:
//!
//! 1. its quality reaches the floor;
//! 2. the agent moved far enough since the last kept frame, or jumped;
//! 3. sensors and actions together changed enough since the last kept frame.
//!
//! The first frame of a session only has to pass the quality floor.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    config::ImitationConfig,
    demonstration::{
        ACTION_ACTIVE, DemonstrationFrame, DemonstrationSession, FrameSample, MAX_FRAME_QUALITY,
        MIN_FRAME_QUALITY, action,
    },
    quality::{DefaultQualityScorer, QualityScorer},
};

/// Why a sample was or was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::IsVariant)]
pub enum FrameVerdict {
    Accepted { quality: f32 },
    NotRecording,
    WidthMismatch,
    LowQuality { quality: f32 },
    NoMovement,
    NoChange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderSettings {
    pub min_quality: f32,
    pub movement_threshold: f32,
    pub change_threshold: f32,
}

impl RecorderSettings {
    #[must_use]
    pub fn from_config(config: &ImitationConfig) -> Self {
        Self {
            min_quality: config.min_frame_quality,
            movement_threshold: config.movement_threshold,
            change_threshold: config.change_threshold,
        }
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::from_config(&ImitationConfig::default())
    }
}

#[derive(Debug)]
struct ActiveSession {
    name: String,
    started_at: DateTime<Utc>,
    frames: Vec<DemonstrationFrame>,
    first_timestamp: Option<f32>,
    last_timestamp: f32,
    last_position: [f32; 3],
}

#[derive(Debug)]
pub struct DemonstrationRecorder {
    settings: RecorderSettings,
    scorer: Box<dyn QualityScorer>,
    active: Option<ActiveSession>,
}

impl DemonstrationRecorder {
    #[must_use]
    pub fn new(settings: RecorderSettings) -> Self {
        Self::with_scorer(settings, Box::new(DefaultQualityScorer::default()))
    }

    #[must_use]
    pub fn with_scorer(settings: RecorderSettings, scorer: Box<dyn QualityScorer>) -> Self {
        Self {
            settings,
            scorer,
            active: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Frames accepted so far in the active session.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.active.as_ref().map_or(0, |s| s.frames.len())
    }

    /// Starts a new session, discarding any session still in progress.
    pub fn start(&mut self, name: impl Into<String>, now: DateTime<Utc>) {
        if let Some(previous) = self.active.take() {
            debug!(
                session = %previous.name,
                frames = previous.frames.len(),
                "discarding unfinished demonstration session"
            );
        }
        self.active = Some(ActiveSession {
            name: name.into(),
            started_at: now,
            frames: Vec::new(),
            first_timestamp: None,
            last_timestamp: 0.0,
            last_position: [0.0; 3],
        });
    }

    pub fn record_frame(&mut self, sample: &FrameSample) -> FrameVerdict {
        let Some(session) = &mut self.active else {
            return FrameVerdict::NotRecording;
        };
        let start = *session.first_timestamp.get_or_insert(sample.timestamp);
        session.last_timestamp = sample.timestamp;

        if let Some(first) = session.frames.first()
            && (first.sensor_inputs.len() != sample.sensors.len()
                || first.human_actions.len() != sample.actions.len())
        {
            return FrameVerdict::WidthMismatch;
        }

        let quality = self
            .scorer
            .score(&sample.sensors, &sample.actions)
            .clamp(MIN_FRAME_QUALITY, MAX_FRAME_QUALITY);
        if quality < self.settings.min_quality {
            return FrameVerdict::LowQuality { quality };
        }

        if let Some(last) = session.frames.last() {
            let displacement = distance(session.last_position, sample.position);
            let jumped = sample
                .actions
                .get(action::JUMP)
                .is_some_and(|&a| a > ACTION_ACTIVE);
            if displacement < self.settings.movement_threshold && !jumped {
                return FrameVerdict::NoMovement;
            }

            let change = abs_delta(&last.sensor_inputs, &sample.sensors)
                + abs_delta(&last.human_actions, &sample.actions);
            if change < self.settings.change_threshold {
                return FrameVerdict::NoChange;
            }
        }

        session.frames.push(DemonstrationFrame::new(
            sample.sensors.clone(),
            sample.actions.clone(),
            quality,
            sample.timestamp - start,
        ));
        session.last_position = sample.position;
        FrameVerdict::Accepted { quality }
    }

    /// Ends the active session.
    ///
    /// Returns `None` if nothing was recording or no frame was accepted.
    pub fn finish(&mut self, total_fitness: f32) -> Option<DemonstrationSession> {
        let session = self.active.take()?;
        if session.frames.is_empty() {
            debug!(session = %session.name, "dropping empty demonstration session");
            return None;
        }
        let duration = session.last_timestamp - session.first_timestamp.unwrap_or(0.0);
        Some(DemonstrationSession {
            session_name: session.name,
            timestamp: session.started_at,
            total_fitness,
            session_duration: duration.max(0.0),
            frames: session.frames,
        })
    }
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

fn abs_delta(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32, forward: f32, jump: f32, t: f32) -> FrameSample {
        FrameSample {
            sensors: vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
            actions: vec![forward, 0.0, 0.0, jump],
            position: [x, 0.0, 0.0],
            timestamp: t,
        }
    }

    fn recorder() -> DemonstrationRecorder {
        let mut r = DemonstrationRecorder::new(RecorderSettings {
            min_quality: 0.3,
            movement_threshold: 0.1,
            change_threshold: 0.05,
        });
        r.start("test", DateTime::UNIX_EPOCH);
        r
    }

    #[test]
    fn test_not_recording() {
        let mut r = DemonstrationRecorder::new(RecorderSettings::default());
        assert_eq!(r.record_frame(&sample(0.0, 1.0, 0.0, 0.0)), FrameVerdict::NotRecording);
        assert!(r.finish(1.0).is_none());
    }

    #[test]
    fn test_first_frame_only_needs_quality() {
        let mut r = recorder();
        assert!(r.record_frame(&sample(0.0, 1.0, 0.0, 0.0)).is_accepted());
    }

    #[test]
    fn test_idle_frames_are_filtered() {
        let mut r = recorder();
        assert!(r.record_frame(&sample(0.0, 1.0, 0.0, 0.0)).is_accepted());
        // moved, but nothing changed
        assert_eq!(r.record_frame(&sample(1.0, 1.0, 0.0, 0.1)), FrameVerdict::NoChange);
        // changed, but did not move
        assert_eq!(r.record_frame(&sample(0.0, 0.5, 0.0, 0.2)), FrameVerdict::NoMovement);
        // moved and changed
        assert!(r.record_frame(&sample(1.0, 0.5, 0.0, 0.3)).is_accepted());
        assert_eq!(r.frame_count(), 2);
    }

    #[test]
    fn test_jump_counts_as_movement() {
        let mut r = recorder();
        assert!(r.record_frame(&sample(0.0, 1.0, 0.0, 0.0)).is_accepted());
        assert!(r.record_frame(&sample(0.0, 1.0, 1.0, 0.1)).is_accepted());
    }

    #[test]
    fn test_low_quality_rejected() {
        let mut r = DemonstrationRecorder::new(RecorderSettings {
            min_quality: 1.0,
            ..RecorderSettings::default()
        });
        r.start("test", DateTime::UNIX_EPOCH);
        // idle frame scores 0.5
        assert!(r.record_frame(&sample(0.0, 0.0, 0.0, 0.0)).is_low_quality());
    }

    #[test]
    fn test_width_mismatch() {
        let mut r = recorder();
        assert!(r.record_frame(&sample(0.0, 1.0, 0.0, 0.0)).is_accepted());
        let mut narrow = sample(1.0, 0.0, 0.0, 0.1);
        narrow.sensors.truncate(4);
        assert_eq!(r.record_frame(&narrow), FrameVerdict::WidthMismatch);
    }

    #[test]
    fn test_finish_builds_session() {
        let mut r = recorder();
        r.record_frame(&sample(0.0, 1.0, 0.0, 2.0));
        r.record_frame(&sample(1.0, 0.0, 1.0, 2.5));
        r.record_frame(&sample(1.0, 0.0, 1.0, 5.0));
        let session = r.finish(12.5).unwrap();
        assert!(!r.is_active());
        assert_eq!(session.session_name, "test");
        assert_eq!(session.total_fitness, 12.5);
        assert_eq!(session.session_duration, 3.0);
        assert_eq!(session.frames[0].timestamp, 0.0);
        assert_eq!(session.frames[1].timestamp, 0.5);
    }

    #[test]
    fn test_empty_session_dropped() {
        let mut r = recorder();
        assert!(r.finish(5.0).is_none());
    }
}
