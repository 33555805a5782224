use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mimic_imitation::{
    Agent as _, ImitationEngine, SkipReason, TickAction, TickReport, ValidationOutcome,
    demonstration::{action, sensor},
};
use mimic_network::{NetworkWeights, WEIGHT_LIMIT};
use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use tracing::{debug, info, warn};

use crate::{
    course::Course,
    evolution::{Population, PopulationEvolver},
    util,
};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum EvolutionPhase {
    #[default]
    Exploration,
    Transition,
    Convergence,
}

impl EvolutionPhase {
    fn from_generation(generation: u64) -> Self {
        match generation {
            0..30 => Self::Exploration,
            30..80 => Self::Transition,
            _ => Self::Convergence,
        }
    }
}

const ELITE_COUNT: usize = 2;
const TOURNAMENT_SIZE: usize = 3;
const MUTATION_RATE: f32 = 0.1;
const BLX_ALPHA: f32 = 0.2;
/// Mutation applied to the copies of an initial network.
const TEMPLATE_SIGMA: f32 = 0.2;

const fn mutation_sigma_by_phase(phase: EvolutionPhase) -> f32 {
    match phase {
        EvolutionPhase::Exploration => 0.3,
        EvolutionPhase::Transition => 0.15,
        EvolutionPhase::Convergence => 0.05,
    }
}

const fn evolver_by_phase(phase: EvolutionPhase) -> PopulationEvolver {
    PopulationEvolver {
        elite_count: ELITE_COUNT,
        tournament_size: TOURNAMENT_SIZE,
        max_weight: WEIGHT_LIMIT,
        mutation_sigma: mutation_sigma_by_phase(phase),
        blx_alpha: BLX_ALPHA,
        mutation_rate: MUTATION_RATE,
    }
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    /// Directory holding demonstration sessions
    #[arg(long)]
    store: PathBuf,
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 100)]
    generations: u64,
    /// Number of individuals
    #[arg(long, default_value_t = 30)]
    population: usize,
    /// Neurons in the hidden layer
    #[arg(long, default_value_t = 12)]
    hidden: usize,
    /// Simulation steps per evaluation
    #[arg(long, default_value_t = 400)]
    steps: usize,
    #[arg(long)]
    seed: Option<u64>,
    /// Weight payload to seed the population with
    #[arg(long)]
    init: Option<PathBuf>,
    /// Output file for the best weights; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let SimulateArg {
        store,
        config,
        generations,
        population: population_size,
        hidden,
        steps,
        seed,
        init,
        output,
    } = arg;
    let config = util::load_config(config.as_deref())?;
    let store = util::open_store(store, &config)?;
    let mut rng = match seed {
        Some(seed) => Pcg64Mcg::seed_from_u64(*seed),
        None => Pcg64Mcg::from_rng(&mut rand::rng()),
    };
    let mut engine = ImitationEngine::with_rng(config, store, Pcg64Mcg::from_rng(&mut rng))
        .context("Invalid imitation configuration")?;
    info!(
        sessions = engine.store().len(),
        frames = engine.store().total_frames_available(),
        "demonstrations loaded"
    );

    let layer_sizes = [sensor::WIDTH, *hidden, action::WIDTH];
    let mut population = match init {
        Some(path) => {
            let template = load_template(path, &mut rng)?;
            Population::from_template(
                &template,
                *population_size,
                ELITE_COUNT,
                TEMPLATE_SIGMA,
                &mut rng,
            )
        }
        None => Population::random(*population_size, &layer_sizes, ELITE_COUNT, &mut rng)
            .context("Invalid network shape")?,
    };
    let course = Course::standard();

    for generation in 0..*generations {
        population.evaluate(&course, *steps);
        if let Some(stats) = population.fitness_stats() {
            info!(
                generation,
                best = stats.max,
                mean = stats.mean,
                worst = stats.min,
                "generation evaluated"
            );
        }

        let report = engine.on_generation_boundary(&mut population);
        log_tick(&report);

        if generation + 1 < *generations {
            population = next_generation(&engine, &population, generation, &mut rng);
        }
    }

    let stats = engine.stats();
    info!(
        applications = stats.applications,
        kept = stats.kept,
        rolled_back = stats.rolled_back,
        rejected = stats.rejected,
        frames = stats.frames_processed,
        strength = engine.strength(),
        stage = %engine.curriculum().current_stage().kind,
        curriculum_completed = engine.curriculum().is_completed(),
        "imitation learning summary"
    );

    let best = population
        .best()
        .context("Population is empty, nothing to save")?;
    info!(fitness = best.fitness(), "best individual");
    let payload = best.weights().to_payload();
    match output {
        Some(path) => {
            mimic_network::write_payload(path, &payload)
                .with_context(|| format!("Failed to save weights: {}", path.display()))?;
            info!(path = %path.display(), "weights saved");
        }
        None => util::print_json(&payload)?,
    }
    Ok(())
}

/// Evolves `population`, keeping the agents blended by a pending
/// validation cycle so they are evaluated with their new weights and can
/// still be rolled back.
fn next_generation(
    engine: &ImitationEngine,
    population: &Population,
    generation: u64,
    rng: &mut Pcg64Mcg,
) -> Population {
    let held = engine
        .validation()
        .pending()
        .map(|pending| {
            pending
                .backups
                .iter()
                .map(|backup| backup.agent_id)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let evolver = evolver_by_phase(EvolutionPhase::from_generation(generation));
    evolver.evolve(population, &held, rng)
}

fn load_template(path: &Path, rng: &mut Pcg64Mcg) -> anyhow::Result<NetworkWeights> {
    let payload = mimic_network::read_payload(path)
        .with_context(|| format!("Failed to load weights: {}", path.display()))?;
    let (weights, fill) = NetworkWeights::from_payload(&payload, rng)
        .with_context(|| format!("Invalid weight payload: {}", path.display()))?;
    if weights.input_width() != sensor::WIDTH || weights.output_width() != action::WIDTH {
        anyhow::bail!(
            "Network {:?} does not map {} sensors to {} actions",
            weights.layer_sizes(),
            sensor::WIDTH,
            action::WIDTH
        );
    }
    if fill.missing > 0 {
        warn!(missing = fill.missing, "initial weights were padded with random values");
    }
    Ok(weights)
}

fn log_tick(report: &TickReport) {
    if let Some(transition) = &report.stage_transition {
        info!(
            generation = report.generation,
            from = %transition.from,
            to = ?transition.to,
            forced = transition.forced,
            "curriculum stage changed"
        );
    }
    if let Some(validation) = &report.validation {
        let outcome = match validation.outcome {
            ValidationOutcome::Kept => "kept",
            ValidationOutcome::RolledBack { .. } => "rolled back",
            ValidationOutcome::Rejected => "rejected",
        };
        info!(
            generation = report.generation,
            score = validation.score,
            outcome,
            strength = validation.strength_after,
            "validation resolved"
        );
    }
    match &report.action {
        TickAction::Applied(application) => info!(
            generation = report.generation,
            reason = %application.reason,
            targets = application.targets.len(),
            "imitation learning applied"
        ),
        TickAction::Skipped(SkipReason::NoTrigger | SkipReason::Cooldown { .. }) => {}
        TickAction::Skipped(reason) => debug!(generation = report.generation, %reason, "skipped"),
    }
}
