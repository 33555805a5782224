//! Orchestration of demonstration-driven weight updates.
//!
//! The engine is driven by the population manager: call
//! [`ImitationEngine::on_generation_boundary`] once after each generation
//! has been evaluated. Each tick
//!
//! 1. feeds the generation's best fitness to the [`FitnessTracker`],
//! 2. lets the [`CurriculumManager`] count the generation and advance,
//! 3. resolves a validation cycle that has come due,
//! 4. runs the trigger gates, and
//! 5. on a trigger, learns from the stored demonstrations and blends the
//!    result into a sample of mid-ranked agents.
//!
//! The gates are evaluated in order and the first verdict wins:
//!
//! | Gate | Skips when |
//! |---|---|
//! | cooldown | a validation cycle is pending, or fewer than `min_cooldown_generations` passed |
//! | demonstrations | the store is empty |
//! | demonstration quality | best session fitness < population average × `quality_multiplier` |
//! | causes | none of stagnation, decline, low diversity or schedule fires |

use mimic_network::NetworkWeights;
use mimic_stats::{descriptive::DescriptiveStats, percentiles};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, ImitationConfig},
    curriculum::{CurriculumManager, StageTransition},
    demonstration::DemonstrationSession,
    fitness_tracker::FitnessTracker,
    learning::{DemonstrationLearner, LearnedWeightSet, LearnerSettings},
    population::{Agent, AgentId, Population},
    store::DemonstrationStore,
    targeting::{TargetCandidate, TargetSelection},
    validation::{
        AgentBackup, PendingValidation, ValidationCycle, ValidationMetrics, ValidationOutcome,
        ValidationReport, ValidationSettings,
    },
};

/// Why learned weights were applied.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::IsVariant)]
pub enum TriggerReason {
    #[display("stagnation detected (score {score:.2})")]
    Stagnation { score: f32 },
    #[display("fitness declining")]
    FitnessDecline,
    #[display("low diversity (coefficient of variation {cv:.3})")]
    LowDiversity { cv: f32 },
    #[display("scheduled after {generations} generations")]
    Scheduled { generations: u64 },
    #[display("manual trigger")]
    Manual,
}

/// Why a generation boundary did not apply learned weights.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::IsVariant)]
pub enum SkipReason {
    #[display("population is empty")]
    EmptyPopulation,
    #[display("validation in progress")]
    ValidationPending,
    #[display("cooldown ({elapsed}/{required} generations)")]
    Cooldown { elapsed: u64, required: u64 },
    #[display("no demonstrations available")]
    NoDemonstrations,
    #[display("demonstrations not good enough (best {best:.2} < required {required:.2})")]
    DemonstrationQuality { best: f32, required: f32 },
    #[display("no trigger condition met")]
    NoTrigger,
    #[display("no demonstration frame admitted for learning")]
    NothingToLearn,
    #[display("no eligible target agents")]
    NoTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, derive_more::IsVariant)]
pub enum TriggerDecision {
    Skip(SkipReason),
    Fire(TriggerReason),
}

/// Summary of one application of learned weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub reason: TriggerReason,
    pub targets: Vec<AgentId>,
    pub strength: f32,
    pub layers: Vec<usize>,
    pub frames_processed: usize,
    pub sessions_used: usize,
}

#[derive(Debug, Clone, PartialEq, derive_more::IsVariant)]
pub enum TickAction {
    Skipped(SkipReason),
    Applied(Application),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub generation: u64,
    pub stagnation_score: f32,
    pub stage_transition: Option<StageTransition>,
    pub validation: Option<ValidationReport>,
    pub action: TickAction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub applications: usize,
    pub kept: usize,
    pub rolled_back: usize,
    pub rejected: usize,
    pub frames_processed: usize,
    pub last_trigger: Option<TriggerReason>,
    pub last_improvement: Option<f32>,
}

#[derive(Debug)]
pub struct ImitationEngine {
    config: ImitationConfig,
    tracker: FitnessTracker,
    curriculum: CurriculumManager,
    store: DemonstrationStore,
    learner: DemonstrationLearner,
    validation: ValidationCycle,
    validation_settings: ValidationSettings,
    strength: f32,
    generations_since_application: u64,
    stats: EngineStats,
    rng: Pcg64Mcg,
}

impl ImitationEngine {
    pub fn new(config: ImitationConfig, store: DemonstrationStore) -> Result<Self, ConfigError> {
        Self::with_rng(config, store, Pcg64Mcg::from_rng(&mut rand::rng()))
    }

    /// Creates an engine whose target sampling is reproducible.
    pub fn with_seed(
        config: ImitationConfig,
        store: DemonstrationStore,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        Self::with_rng(config, store, Pcg64Mcg::seed_from_u64(seed))
    }

    pub fn with_rng(
        config: ImitationConfig,
        store: DemonstrationStore,
        rng: Pcg64Mcg,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracker: FitnessTracker::new(config.fitness_window, config.improvement_epsilon),
            curriculum: CurriculumManager::with_default_stages(config.curriculum_mastery_scale),
            learner: DemonstrationLearner::new(LearnerSettings::from_config(&config)),
            validation: ValidationCycle::default(),
            validation_settings: ValidationSettings::from_config(&config),
            strength: config.blend_strength,
            generations_since_application: 0,
            stats: EngineStats::default(),
            store,
            rng,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ImitationConfig {
        &self.config
    }

    /// Current blend strength; adjusted by validation outcomes.
    #[must_use]
    pub fn strength(&self) -> f32 {
        self.strength
    }

    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    #[must_use]
    pub fn tracker(&self) -> &FitnessTracker {
        &self.tracker
    }

    #[must_use]
    pub fn curriculum(&self) -> &CurriculumManager {
        &self.curriculum
    }

    #[must_use]
    pub fn store(&self) -> &DemonstrationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DemonstrationStore {
        &mut self.store
    }

    #[must_use]
    pub fn validation(&self) -> &ValidationCycle {
        &self.validation
    }

    #[must_use]
    pub fn generations_since_application(&self) -> u64 {
        self.generations_since_application
    }

    /// Advances the engine by one generation.
    pub fn on_generation_boundary<P>(&mut self, population: &mut P) -> TickReport
    where
        P: Population + ?Sized,
    {
        let generation = population.generation();
        let fitnesses = population.fitnesses();
        let Some(best) = fitnesses.iter().copied().reduce(f32::max) else {
            debug!(generation, "empty population, nothing to do");
            return TickReport {
                generation,
                stagnation_score: self.tracker.stagnation_score(),
                stage_transition: None,
                validation: None,
                action: TickAction::Skipped(SkipReason::EmptyPopulation),
            };
        };

        self.generations_since_application += 1;
        self.tracker.update(best);

        let stage_transition = if self.config.use_curriculum {
            percentiles::percentile(&fitnesses, self.config.curriculum_percentile)
                .and_then(|pct| self.curriculum.evaluate(pct))
        } else {
            None
        };

        let validation = self.resolve_validation(population);

        let action = match self.evaluate_trigger(population) {
            TriggerDecision::Skip(reason) => {
                debug!(generation, %reason, "imitation learning skipped");
                TickAction::Skipped(reason)
            }
            TriggerDecision::Fire(reason) => match self.apply(population, reason) {
                Ok(application) => TickAction::Applied(application),
                Err(reason) => {
                    debug!(generation, %reason, "imitation learning triggered but not applied");
                    TickAction::Skipped(reason)
                }
            },
        };

        TickReport {
            generation,
            stagnation_score: self.tracker.stagnation_score(),
            stage_transition,
            validation,
            action,
        }
    }

    /// Runs the trigger gates against the current state without side effects.
    pub fn evaluate_trigger<P>(&self, population: &P) -> TriggerDecision
    where
        P: Population + ?Sized,
    {
        let fitnesses = population.fitnesses();
        let Some(stats) = DescriptiveStats::new(fitnesses.iter().copied()) else {
            return TriggerDecision::Skip(SkipReason::EmptyPopulation);
        };

        if self.validation.is_pending() {
            return TriggerDecision::Skip(SkipReason::ValidationPending);
        }
        if self.generations_since_application < self.config.min_cooldown_generations {
            return TriggerDecision::Skip(SkipReason::Cooldown {
                elapsed: self.generations_since_application,
                required: self.config.min_cooldown_generations,
            });
        }

        let Some(best_demo) = self.store.best() else {
            return TriggerDecision::Skip(SkipReason::NoDemonstrations);
        };
        if self.config.require_quality_demonstrations {
            let required = stats.mean * self.config.quality_multiplier;
            if best_demo.total_fitness < required {
                return TriggerDecision::Skip(SkipReason::DemonstrationQuality {
                    best: best_demo.total_fitness,
                    required,
                });
            }
        }

        if self.tracker.is_stagnating(self.config.stagnation_threshold) {
            return TriggerDecision::Fire(TriggerReason::Stagnation {
                score: self.tracker.stagnation_score(),
            });
        }
        if self.tracker.is_declining(self.config.decline_threshold) {
            return TriggerDecision::Fire(TriggerReason::FitnessDecline);
        }
        let cv = stats.coefficient_of_variation();
        if cv < self.config.low_diversity_threshold {
            return TriggerDecision::Fire(TriggerReason::LowDiversity { cv });
        }
        if self.generations_since_application >= self.config.max_interval_generations {
            return TriggerDecision::Fire(TriggerReason::Scheduled {
                generations: self.generations_since_application,
            });
        }
        TriggerDecision::Skip(SkipReason::NoTrigger)
    }

    /// Learns and applies immediately, bypassing cooldown, quality and
    /// cause gates.
    ///
    /// A pending validation cycle is still respected: only one cycle can be
    /// in flight.
    pub fn apply_now<P>(&mut self, population: &mut P) -> Result<Application, SkipReason>
    where
        P: Population + ?Sized,
    {
        if population.agents().is_empty() {
            return Err(SkipReason::EmptyPopulation);
        }
        if self.validation.is_pending() {
            return Err(SkipReason::ValidationPending);
        }
        if self.store.is_empty() {
            return Err(SkipReason::NoDemonstrations);
        }
        self.apply(population, TriggerReason::Manual)
    }

    /// Learns a weight set from the stored demonstrations, using `reference`
    /// for layer shapes and hidden activations.
    #[must_use]
    pub fn learn(&self, reference: &NetworkWeights) -> Option<LearnedWeightSet> {
        let stage = self
            .config
            .use_curriculum
            .then(|| self.curriculum.current_stage());
        self.learner.learn(self.learning_sessions(), reference, stage)
    }

    fn learning_sessions(&self) -> Vec<&DemonstrationSession> {
        if self.config.use_all_sessions {
            self.store.sessions().collect()
        } else {
            self.store.top(self.config.max_sessions)
        }
    }

    fn apply<P>(&mut self, population: &mut P, reason: TriggerReason) -> Result<Application, SkipReason>
    where
        P: Population + ?Sized,
    {
        let reference = population
            .best_agent()
            .map(|agent| agent.weights().clone())
            .ok_or(SkipReason::EmptyPopulation)?;
        let learned = self.learn(&reference).ok_or(SkipReason::NothingToLearn)?;

        let candidates = population
            .agents()
            .iter()
            .map(TargetCandidate::from_agent)
            .collect::<Vec<_>>();
        let selection = TargetSelection::from_config(&self.config, population.elite_count());
        let selected = selection.select(&candidates, &mut self.rng);
        if selected.is_empty() {
            return Err(SkipReason::NoTargets);
        }
        let baseline = ValidationMetrics::capture(population).ok_or(SkipReason::EmptyPopulation)?;

        population.set_paused(true);
        let mut backups = Vec::with_capacity(selected.len());
        for id in selected {
            let Some(agent) = population.agent_mut(id) else {
                continue;
            };
            let backup = AgentBackup::of(&*agent);
            match learned.apply_to(agent.weights_mut(), self.strength) {
                Ok(()) => backups.push(backup),
                Err(e) => warn!(agent = id, error = %e, "learned weights do not fit agent"),
            }
        }
        population.set_paused(false);

        if backups.is_empty() {
            return Err(SkipReason::NoTargets);
        }
        let targets = backups.iter().map(|b| b.agent_id).collect::<Vec<_>>();

        if self.config.validation_enabled {
            self.validation.begin(PendingValidation {
                due_generation: population.generation() + self.config.validation_generations,
                baseline,
                backups,
            });
        }
        self.generations_since_application = 0;
        self.stats.applications += 1;
        self.stats.frames_processed += learned.frames_processed;
        self.stats.last_trigger = Some(reason);

        info!(
            %reason,
            targets = targets.len(),
            strength = self.strength,
            frames = learned.frames_processed,
            sessions = learned.sessions_used,
            stage = %self.curriculum.current_stage().kind,
            "applied learned weights"
        );
        Ok(Application {
            reason,
            targets,
            strength: self.strength,
            layers: learned.layer_indices(),
            frames_processed: learned.frames_processed,
            sessions_used: learned.sessions_used,
        })
    }

    fn resolve_validation<P>(&mut self, population: &mut P) -> Option<ValidationReport>
    where
        P: Population + ?Sized,
    {
        let report = self.validation.resolve(
            population,
            &self.validation_settings,
            &mut self.strength,
        )?;
        match report.outcome {
            ValidationOutcome::Kept => self.stats.kept += 1,
            ValidationOutcome::RolledBack { .. } => self.stats.rolled_back += 1,
            ValidationOutcome::Rejected => self.stats.rejected += 1,
        }
        self.stats.last_improvement = Some(report.score);
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::{
        demonstration::DemonstrationFrame,
        recorder::{DemonstrationRecorder, RecorderSettings},
        storage::MemoryStorage,
        testing::TestPopulation,
    };

    fn session(name: &str, fitness: f32) -> DemonstrationSession {
        DemonstrationSession {
            session_name: name.to_owned(),
            timestamp: DateTime::UNIX_EPOCH,
            total_fitness: fitness,
            session_duration: 2.0,
            frames: (0..4u8)
                .map(|i| {
                    DemonstrationFrame::new(
                        vec![0.9, 0.8, 0.7, 0.8, 0.9, 0.0, 0.2, 0.1],
                        vec![1.0, 0.1, 0.0, 0.0],
                        1.5,
                        0.5 * f32::from(i),
                    )
                })
                .collect(),
        }
    }

    fn store(sessions: &[(&str, f32)]) -> DemonstrationStore {
        let mut store = DemonstrationStore::open(
            Box::new(MemoryStorage::new()),
            DemonstrationRecorder::new(RecorderSettings::default()),
            3,
        )
        .unwrap();
        for (name, fitness) in sessions {
            store.insert(session(name, *fitness));
        }
        store
    }

    fn population() -> TestPopulation {
        TestPopulation {
            elite_count: 2,
            ..TestPopulation::with_fitness(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0])
        }
    }

    fn engine(config: ImitationConfig, sessions: &[(&str, f32)]) -> ImitationEngine {
        ImitationEngine::with_seed(config, store(sessions), 7).unwrap()
    }

    fn tick(engine: &mut ImitationEngine, population: &mut TestPopulation) -> TickReport {
        population.generation += 1;
        engine.on_generation_boundary(population)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ImitationConfig {
            blend_strength: 1.5,
            ..ImitationConfig::default()
        };
        assert!(ImitationEngine::new(config, store(&[])).is_err());
    }

    #[test]
    fn test_cooldown_then_no_demonstrations() {
        let mut engine = engine(ImitationConfig::default(), &[]);
        let mut population = population();
        for elapsed in 1..5 {
            let report = tick(&mut engine, &mut population);
            assert_eq!(
                report.action,
                TickAction::Skipped(SkipReason::Cooldown {
                    elapsed,
                    required: 5
                })
            );
        }
        let report = tick(&mut engine, &mut population);
        assert_eq!(report.action, TickAction::Skipped(SkipReason::NoDemonstrations));
    }

    #[test]
    fn test_demonstration_quality_gate() {
        let mut engine = engine(ImitationConfig::default(), &[("weak", 5.0)]);
        let mut population = population();
        for _ in 0..4 {
            tick(&mut engine, &mut population);
        }
        let report = tick(&mut engine, &mut population);
        assert!(matches!(
            report.action,
            TickAction::Skipped(SkipReason::DemonstrationQuality { best, required })
                if best == 5.0 && (required - 5.5).abs() < 1e-6
        ));
    }

    #[test]
    fn test_stagnation_fires_after_plateau() {
        let mut engine = engine(ImitationConfig::default(), &[("expert", 50.0)]);
        let mut population = population();
        for _ in 0..7 {
            let report = tick(&mut engine, &mut population);
            assert!(report.action.is_skipped());
        }
        let report = tick(&mut engine, &mut population);
        let TickAction::Applied(application) = report.action else {
            panic!("expected an application, got {:?}", report.action);
        };
        assert!(application.reason.is_stagnation());
        let mut targets = application.targets.clone();
        targets.sort_unstable();
        assert_eq!(targets, vec![2, 3, 4, 5]);
        assert_eq!(application.layers, vec![1]);
        assert_eq!(engine.generations_since_application(), 0);
        assert_eq!(population.pause_events, vec![true, false]);
    }

    #[test]
    fn test_low_diversity_and_scheduled_triggers() {
        let config = ImitationConfig {
            stagnation_threshold: 1.0,
            ..ImitationConfig::default()
        };
        let mut engine = engine(config, &[("expert", 50.0)]);
        let mut population = TestPopulation::with_fitness(&[4.0; 6]);
        for _ in 0..4 {
            tick(&mut engine, &mut population);
        }
        let report = tick(&mut engine, &mut population);
        assert!(matches!(
            report.action,
            TickAction::Applied(Application {
                reason: TriggerReason::LowDiversity { .. },
                ..
            })
        ));

        let config = ImitationConfig {
            stagnation_threshold: 1.0,
            low_diversity_threshold: 0.0,
            max_interval_generations: 7,
            ..ImitationConfig::default()
        };
        let mut engine = self::engine(config, &[("expert", 50.0)]);
        let mut population = self::population();
        let actions = (0..7)
            .map(|_| tick(&mut engine, &mut population).action)
            .collect::<Vec<_>>();
        assert_eq!(actions[4], TickAction::Skipped(SkipReason::NoTrigger));
        assert_eq!(actions[5], TickAction::Skipped(SkipReason::NoTrigger));
        assert!(matches!(
            &actions[6],
            TickAction::Applied(Application {
                reason: TriggerReason::Scheduled { generations: 7 },
                ..
            })
        ));
    }

    #[test]
    fn test_fitness_decline_fires_below_stagnation() {
        let config = ImitationConfig {
            use_curriculum: false,
            ..ImitationConfig::default()
        };
        let mut engine = engine(config, &[("expert", 100.0)]);
        let mut fire = None;
        for (generation, best) in (1..).zip([30.0, 31.0, 32.0, 33.0, 34.0, 18.0]) {
            let mut population = TestPopulation {
                generation,
                ..TestPopulation::with_fitness(&[best, best * 0.5, best * 0.25, best * 0.1])
            };
            let report = engine.on_generation_boundary(&mut population);
            assert!(report.stagnation_score < 0.6);
            if generation < 6 {
                assert!(report.action.is_skipped());
            } else {
                fire = Some(report.action);
            }
        }
        let Some(TickAction::Applied(application)) = fire else {
            panic!("expected an application, got {fire:?}");
        };
        assert_eq!(application.reason, TriggerReason::FitnessDecline);
        assert!(engine.tracker().is_declining(0.05));
        assert!(!engine.tracker().is_stagnating(0.6));
    }

    #[test]
    fn test_zero_strength_leaves_weights_untouched() {
        let config = ImitationConfig {
            blend_strength: 0.0,
            min_strength: 0.0,
            ..ImitationConfig::default()
        };
        let mut engine = engine(config, &[("expert", 50.0)]);
        let mut population = population();
        let before = population.clone();
        let application = engine.apply_now(&mut population).unwrap();
        assert!(!application.targets.is_empty());
        for (agent, original) in population.agents.iter().zip(&before.agents) {
            assert_eq!(agent.weights, original.weights);
        }
    }

    #[test]
    fn test_full_strength_replaces_learned_layer() {
        let config = ImitationConfig {
            blend_strength: 1.0,
            max_strength: 1.0,
            ..ImitationConfig::default()
        };
        let mut engine = engine(config, &[("expert", 50.0)]);
        let mut population = population();
        let reference = population.best_agent().unwrap().weights.clone();
        let learned = engine.learn(&reference).unwrap();
        let application = engine.apply_now(&mut population).unwrap();
        assert_eq!(application.frames_processed, 4);
        assert_eq!(engine.stats().frames_processed, 4);

        let learned_layer = &learned.layers[0];
        for id in &application.targets {
            let agent = population.agents.iter().find(|a| a.id == *id).unwrap();
            assert_eq!(
                agent.weights.layer(learned_layer.layer_index).unwrap(),
                learned_layer.weights.as_slice()
            );
        }
    }

    #[test]
    fn test_rollback_after_failed_validation() {
        let mut engine = engine(ImitationConfig::default(), &[("expert", 50.0)]);
        let mut population = population();
        let originals = population.clone();
        let application = engine.apply_now(&mut population).unwrap();
        assert!(engine.validation().is_pending());
        assert_eq!(
            engine.apply_now(&mut population),
            Err(SkipReason::ValidationPending)
        );

        for agent in &mut population.agents {
            agent.fitness *= 0.5;
        }
        for _ in 0..2 {
            let report = tick(&mut engine, &mut population);
            assert!(report.validation.is_none());
            assert_eq!(report.action, TickAction::Skipped(SkipReason::ValidationPending));
        }
        let report = tick(&mut engine, &mut population);
        let validation = report.validation.unwrap();
        assert_eq!(
            validation.outcome,
            ValidationOutcome::RolledBack {
                restored: application.targets.len(),
                missing: 0
            }
        );
        assert!((engine.strength() - 0.24).abs() < 1e-6);
        assert_eq!(engine.stats().rolled_back, 1);
        assert!(!engine.validation().is_pending());
        for (agent, original) in population.agents.iter().zip(&originals.agents) {
            assert_eq!(agent.weights, original.weights);
        }
    }

    #[test]
    fn test_kept_after_successful_validation() {
        let mut engine = engine(ImitationConfig::default(), &[("expert", 50.0)]);
        let mut population = population();
        let application = engine.apply_now(&mut population).unwrap();
        let modified = population.clone();
        for agent in &mut population.agents {
            agent.fitness *= 2.0;
        }
        tick(&mut engine, &mut population);
        tick(&mut engine, &mut population);
        let report = tick(&mut engine, &mut population);
        assert!(report.validation.unwrap().outcome.is_kept());
        assert!((engine.strength() - 0.33).abs() < 1e-6);
        assert_eq!(engine.stats().kept, 1);
        for id in &application.targets {
            let idx = usize::try_from(*id).unwrap();
            assert_eq!(population.agents[idx].weights, modified.agents[idx].weights);
        }
    }
}
