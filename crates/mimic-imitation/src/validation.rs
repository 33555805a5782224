//! Baseline, wait, compare, keep or roll back.
//!
//! Every application of learned weights opens a validation cycle:
//!
//! ```text
//! Idle ──apply──▶ Pending { baseline, backups } ──N generations──▶ resolve ──▶ Idle
//! ```
//!
//! On resolution the population is measured again and compared with the
//! baseline through a weighted improvement score:
//!
//! ```text
//! score = 0.6 * fitness_delta + 0.3 * efficiency_delta + 0.1 * exploration_delta
//! ```
//!
//! with `fitness_delta = Δavg / max(|avg₀|, 1)`, `efficiency_delta = eff₁ - eff₀`
//! and `exploration_delta = (exp₁ - exp₀) / max(exp₀, 0.01)`, each clamped to
//! `[-1, 1]`. A score below the threshold restores every backed-up agent's
//! weights verbatim (when auto-rollback is on).

use chrono::{DateTime, Utc};
use mimic_network::NetworkWeights;
use mimic_stats::descriptive::DescriptiveStats;
use tracing::{debug, info, warn};

use crate::{
    config::ImitationConfig,
    population::{Agent, AgentId, Population},
};

const WEIGHT_FITNESS: f32 = 0.6;
const WEIGHT_EFFICIENCY: f32 = 0.3;
const WEIGHT_EXPLORATION: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationMetrics {
    pub average_fitness: f32,
    pub best_fitness: f32,
    pub worst_fitness: f32,
    pub task_efficiency: f32,
    pub exploration_rate: f32,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
}

impl ValidationMetrics {
    /// Measures the population.
    ///
    /// Efficiency and exploration are averaged over the agents that report
    /// them. When no agent reports exploration, the fitness coefficient of
    /// variation (capped at 1) stands in for it. Returns `None` for an
    /// empty population.
    #[must_use]
    pub fn capture<P>(population: &P) -> Option<Self>
    where
        P: Population + ?Sized,
    {
        let agents = population.agents();
        let stats = DescriptiveStats::new(agents.iter().map(Agent::fitness))?;
        let task_efficiency = mean_of(agents.iter().filter_map(Agent::task_efficiency)).unwrap_or(0.0);
        let exploration_rate = mean_of(agents.iter().filter_map(Agent::exploration))
            .unwrap_or_else(|| stats.coefficient_of_variation().min(1.0));
        Some(Self {
            average_fitness: stats.mean,
            best_fitness: stats.max,
            worst_fitness: stats.min,
            task_efficiency,
            exploration_rate,
            generation: population.generation(),
            timestamp: Utc::now(),
        })
    }
}

fn mean_of<I>(values: I) -> Option<f32>
where
    I: Iterator<Item = f32>,
{
    let values = values.collect::<Vec<_>>();
    mimic_stats::mean(&values)
}

/// Weighted improvement of `post` over `baseline`.
#[must_use]
pub fn improvement_score(baseline: &ValidationMetrics, post: &ValidationMetrics) -> f32 {
    let fitness_delta = ((post.average_fitness - baseline.average_fitness)
        / baseline.average_fitness.abs().max(1.0))
    .clamp(-1.0, 1.0);
    let efficiency_delta = (post.task_efficiency - baseline.task_efficiency).clamp(-1.0, 1.0);
    let exploration_delta = ((post.exploration_rate - baseline.exploration_rate)
        / baseline.exploration_rate.max(0.01))
    .clamp(-1.0, 1.0);
    WEIGHT_FITNESS * fitness_delta
        + WEIGHT_EFFICIENCY * efficiency_delta
        + WEIGHT_EXPLORATION * exploration_delta
}

/// Full copy of one agent's weights taken right before blending.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBackup {
    pub agent_id: AgentId,
    pub weights: NetworkWeights,
    pub fitness: f32,
}

impl AgentBackup {
    pub fn of<A>(agent: &A) -> Self
    where
        A: Agent + ?Sized,
    {
        Self {
            agent_id: agent.id(),
            weights: agent.weights().clone(),
            fitness: agent.fitness(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingValidation {
    pub baseline: ValidationMetrics,
    pub backups: Vec<AgentBackup>,
    pub due_generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationSettings {
    pub generations: u64,
    pub min_improvement: f32,
    pub auto_rollback: bool,
    pub adaptive_strength: bool,
    pub min_strength: f32,
    pub max_strength: f32,
}

impl ValidationSettings {
    #[must_use]
    pub fn from_config(config: &ImitationConfig) -> Self {
        Self {
            generations: config.validation_generations,
            min_improvement: config.min_improvement,
            auto_rollback: config.auto_rollback,
            adaptive_strength: config.adaptive_strength,
            min_strength: config.min_strength,
            max_strength: config.max_strength,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum ValidationOutcome {
    /// The changes helped and were kept.
    Kept,
    /// The changes did not help; `restored` agents got their weights back
    /// and `missing` backed-up agents no longer exist.
    RolledBack { restored: usize, missing: usize },
    /// The changes did not help, but auto-rollback is off.
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub baseline: ValidationMetrics,
    pub post: ValidationMetrics,
    pub score: f32,
    pub outcome: ValidationOutcome,
    pub strength_before: f32,
    pub strength_after: f32,
}

#[derive(Debug, Clone, Default)]
pub enum ValidationCycle {
    #[default]
    Idle,
    Pending(PendingValidation),
}

impl ValidationCycle {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    #[must_use]
    pub fn is_due(&self, generation: u64) -> bool {
        match self {
            Self::Idle => false,
            Self::Pending(pending) => generation >= pending.due_generation,
        }
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingValidation> {
        match self {
            Self::Idle => None,
            Self::Pending(pending) => Some(pending),
        }
    }

    pub fn begin(&mut self, pending: PendingValidation) {
        if let Self::Pending(previous) = self {
            warn!(
                due = previous.due_generation,
                "abandoning unresolved validation cycle"
            );
        }
        *self = Self::Pending(pending);
    }

    /// Drops a pending cycle without touching any agent.
    pub fn abandon(&mut self) {
        *self = Self::Idle;
    }

    /// Resolves the pending cycle if it is due.
    ///
    /// `strength` is the current blend strength; it is adjusted in place
    /// when adaptive strength is enabled. The cycle returns to idle
    /// whatever the outcome.
    pub fn resolve<P>(
        &mut self,
        population: &mut P,
        settings: &ValidationSettings,
        strength: &mut f32,
    ) -> Option<ValidationReport>
    where
        P: Population + ?Sized,
    {
        if !self.is_due(population.generation()) {
            return None;
        }
        let Self::Pending(pending) = std::mem::take(self) else {
            return None;
        };
        let Some(post) = ValidationMetrics::capture(population) else {
            debug!("population empty at validation time, dropping backups");
            return None;
        };

        let score = improvement_score(&pending.baseline, &post);
        let strength_before = *strength;
        let outcome = if score >= settings.min_improvement {
            if settings.adaptive_strength && score > 2.0 * settings.min_improvement {
                *strength = (*strength * 1.1).min(settings.max_strength);
            }
            info!(score, strength = *strength, "imitation learning validated, keeping changes");
            ValidationOutcome::Kept
        } else {
            let outcome = if settings.auto_rollback {
                let (restored, missing) = restore(population, pending.backups);
                info!(score, restored, missing, "imitation learning did not help, rolled back");
                ValidationOutcome::RolledBack { restored, missing }
            } else {
                info!(score, "imitation learning did not help, rollback disabled");
                ValidationOutcome::Rejected
            };
            if settings.adaptive_strength {
                *strength = (*strength * 0.8).max(settings.min_strength);
            }
            outcome
        };

        Some(ValidationReport {
            baseline: pending.baseline,
            post,
            score,
            outcome,
            strength_before,
            strength_after: *strength,
        })
    }
}

fn restore<P>(population: &mut P, backups: Vec<AgentBackup>) -> (usize, usize)
where
    P: Population + ?Sized,
{
    population.set_paused(true);
    let mut restored = 0;
    let mut missing = 0;
    for backup in backups {
        match population.agent_mut(backup.agent_id) {
            Some(agent) => {
                agent.set_weights(backup.weights);
                restored += 1;
            }
            None => {
                debug!(agent = backup.agent_id, "backed-up agent no longer exists");
                missing += 1;
            }
        }
    }
    population.set_paused(false);
    (restored, missing)
}
