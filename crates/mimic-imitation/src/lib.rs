//! Imitation learning on top of an evolutionary population.
//!
//! Human operators drive an agent while a [`DemonstrationRecorder`] turns
//! what they see and do into [`DemonstrationFrame`]s. Finished sessions
//! go into a fitness-ranked [`DemonstrationStore`]. When evolution stalls,
//! the [`ImitationEngine`] learns a weight set from the best sessions and
//! blends it into a sample of mid-ranked agents, then checks a few
//! generations later whether that helped and rolls back if it did not.
//!
//! ```text
//! operator ──▶ recorder ──▶ store (top K) ─┐
//!                                          ▼
//! population ──▶ tracker / curriculum ──▶ engine ──▶ blend ──▶ validate / rollback
//! ```
//!
//! The engine sees the population only through the [`Agent`] and
//! [`Population`] traits.
//!
//! # Modules
//!
//! - [`config`]: the flat tunables object
//! - [`demonstration`], [`quality`], [`recorder`]: frame capture
//! - [`storage`], [`store`]: persistence and top-K retention
//! - [`fitness_tracker`]: stagnation scoring
//! - [`curriculum`]: staged frame admission
//! - [`learning`]: the learning rule
//! - [`targeting`]: target agent selection
//! - [`validation`]: baseline, backups, rollback
//! - [`engine`]: the orchestrator

pub use self::{
    config::{ConfigError, ImitationConfig},
    curriculum::{CurriculumManager, CurriculumStage, StageKind},
    demonstration::{DemonstrationFrame, DemonstrationSession, FrameSample},
    engine::{
        Application, EngineStats, ImitationEngine, SkipReason, TickAction, TickReport,
        TriggerDecision, TriggerReason,
    },
    fitness_tracker::FitnessTracker,
    population::{Agent, AgentId, Population},
    recorder::{DemonstrationRecorder, FrameVerdict, RecorderSettings},
    storage::{DirectoryStorage, MemoryStorage, SessionStorage, StorageError},
    store::DemonstrationStore,
    validation::{ValidationOutcome, ValidationReport},
};

pub mod config;
pub mod curriculum;
pub mod demonstration;
pub mod engine;
pub mod fitness_tracker;
pub mod learning;
pub mod population;
pub mod quality;
pub mod recorder;
pub mod storage;
pub mod store;
pub mod targeting;
pub mod validation;

#[cfg(test)]
mod testing;
