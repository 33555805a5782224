//! Staged curriculum over behavior complexity.
//!
//! Five stages are traversed strictly in order:
//!
//! ```text
//! Basic → Turning → Navigation → Jumping → Advanced → (completed)
//! ```
//!
//! Each stage restricts which demonstration frames are admitted to
//! learning and how strongly each action dimension counts. The manager
//! moves to the next stage once the population masters the current one,
//! or once it has spent the stage's maximum number of generations there.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::demonstration::{ACTION_ACTIVE, DemonstrationFrame, action, sensor};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum StageKind {
    Basic,
    Turning,
    Navigation,
    Jumping,
    Advanced,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Basic,
        StageKind::Turning,
        StageKind::Navigation,
        StageKind::Jumping,
        StageKind::Advanced,
    ];

    /// Whether the frame's action pattern belongs to this stage.
    ///
    /// - **Basic**: forward-dominant, no jump
    /// - **Turning**: a noticeable turn, no jump
    /// - **Navigation**: moving or turning without jumping while an obstacle is in view
    /// - **Jumping**: the jump action is pressed
    /// - **Advanced**: everything
    #[must_use]
    pub fn matches(self, frame: &DemonstrationFrame) -> bool {
        let forward = frame.action(action::FORWARD);
        let turn = frame.action(action::TURN_LEFT).max(frame.action(action::TURN_RIGHT));
        let jumping = frame.is_jumping();
        match self {
            StageKind::Basic => !jumping && forward > ACTION_ACTIVE && forward >= turn,
            StageKind::Turning => !jumping && turn > 0.3,
            StageKind::Navigation => {
                let nearest_ray = frame
                    .sensor_inputs
                    .get(sensor::RAYS)
                    .and_then(|rays| rays.iter().copied().reduce(f32::min))
                    .unwrap_or(1.0);
                !jumping && (forward > 0.3 || turn > 0.3) && nearest_ray < 0.5
            }
            StageKind::Jumping => jumping,
            StageKind::Advanced => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumStage {
    pub kind: StageKind,
    /// One weight per action dimension.
    pub behavior_weights: Vec<f32>,
    pub quality_threshold: f32,
    pub min_generations: u64,
    pub max_generations: u64,
    pub mastery_fitness: f32,
}

impl CurriculumStage {
    #[must_use]
    pub fn level(&self) -> usize {
        self.kind as usize
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.kind {
            StageKind::Basic => "Basic Movement",
            StageKind::Turning => "Turning",
            StageKind::Navigation => "Obstacle Navigation",
            StageKind::Jumping => "Jumping",
            StageKind::Advanced => "Advanced Maneuvers",
        }
    }

    /// Weight of action dimension `j`; dimensions beyond the table weigh 1.
    #[must_use]
    pub fn behavior_weight(&self, j: usize) -> f32 {
        self.behavior_weights.get(j).copied().unwrap_or(1.0)
    }

    /// The full frame-admission test: stage pattern and quality floor.
    #[must_use]
    pub fn admits(&self, frame: &DemonstrationFrame) -> bool {
        frame.frame_quality >= self.quality_threshold && self.kind.matches(frame)
    }

    /// The stage table, with every mastery fitness multiplied by `mastery_scale`.
    #[must_use]
    pub fn default_stages(mastery_scale: f32) -> Vec<Self> {
        [
            (StageKind::Basic, [1.0, 0.2, 0.2, 0.0], 0.5, 3, 15, 10.0),
            (StageKind::Turning, [0.6, 1.0, 1.0, 0.1], 0.6, 3, 20, 20.0),
            (StageKind::Navigation, [1.0, 0.8, 0.8, 0.3], 0.8, 5, 25, 35.0),
            (StageKind::Jumping, [0.5, 0.3, 0.3, 1.0], 1.0, 5, 30, 50.0),
            (StageKind::Advanced, [1.0, 1.0, 1.0, 1.0], 1.2, 5, 40, 75.0),
        ]
        .into_iter()
        .map(
            |(kind, weights, quality_threshold, min_generations, max_generations, mastery)| Self {
                kind,
                behavior_weights: Vec::from(weights),
                quality_threshold,
                min_generations,
                max_generations,
                mastery_fitness: mastery * mastery_scale,
            },
        )
        .collect()
    }
}

/// A move from one stage to the next, or into the completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    pub from: StageKind,
    /// `None` when the curriculum has just completed.
    pub to: Option<StageKind>,
    /// Whether the move was forced by the stage's generation limit.
    pub forced: bool,
}

#[derive(Debug, Clone)]
pub struct CurriculumManager {
    stages: Vec<CurriculumStage>,
    current: usize,
    generations_at_stage: u64,
    completed: bool,
}

impl CurriculumManager {
    /// # Panics
    ///
    /// Panics if `stages` is empty.
    #[must_use]
    pub fn new(stages: Vec<CurriculumStage>) -> Self {
        assert!(!stages.is_empty(), "curriculum needs at least one stage");
        Self {
            stages,
            current: 0,
            generations_at_stage: 0,
            completed: false,
        }
    }

    #[must_use]
    pub fn with_default_stages(mastery_scale: f32) -> Self {
        Self::new(CurriculumStage::default_stages(mastery_scale))
    }

    /// The active stage; the last stage once the curriculum is completed.
    #[must_use]
    pub fn current_stage(&self) -> &CurriculumStage {
        &self.stages[self.current]
    }

    #[must_use]
    pub fn stage_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn stages(&self) -> &[CurriculumStage] {
        &self.stages
    }

    #[must_use]
    pub fn generations_at_stage(&self) -> u64 {
        self.generations_at_stage
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn record_generation(&mut self) {
        if !self.completed {
            self.generations_at_stage += 1;
        }
    }

    #[must_use]
    pub fn should_advance(&self, percentile_fitness: f32) -> bool {
        if self.completed {
            return false;
        }
        let stage = self.current_stage();
        let mastered = self.generations_at_stage >= stage.min_generations
            && percentile_fitness >= stage.mastery_fitness;
        mastered || self.generations_at_stage >= stage.max_generations
    }

    /// Moves to the next stage, or into the completed state from the last
    /// one. Does nothing once completed.
    pub fn advance(&mut self) -> Option<StageTransition> {
        if self.completed {
            return None;
        }
        let from = self.current_stage().kind;
        let forced = self.generations_at_stage >= self.current_stage().max_generations;
        self.generations_at_stage = 0;
        let to = if self.current + 1 < self.stages.len() {
            self.current += 1;
            Some(self.current_stage().kind)
        } else {
            self.completed = true;
            None
        };
        match to {
            Some(to) => info!(%from, %to, forced, "curriculum advanced"),
            None => info!(%from, "curriculum completed"),
        }
        Some(StageTransition { from, to, forced })
    }

    /// Counts one generation at the current stage and advances if warranted.
    pub fn evaluate(&mut self, percentile_fitness: f32) -> Option<StageTransition> {
        self.record_generation();
        if self.should_advance(percentile_fitness) {
            self.advance()
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_frame_relevant(frame: &DemonstrationFrame, stage: &CurriculumStage) -> bool {
        stage.admits(frame)
    }
}
