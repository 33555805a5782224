use std::path::PathBuf;

use chrono::Utc;
use mimic_imitation::{FrameSample, FrameVerdict};
use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use tracing::{debug, info};

use crate::{
    course::{Controller as _, Course},
    operator::ScriptedOperator,
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RecordArg {
    /// Directory holding demonstration sessions
    #[arg(long)]
    store: PathBuf,
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of sessions to record
    #[arg(long, default_value_t = 3)]
    sessions: usize,
    /// Maximum number of simulation steps per session
    #[arg(long, default_value_t = 600)]
    frames: usize,
    /// Standard deviation of the operator's action noise
    #[arg(long, default_value_t = 0.15)]
    noise: f32,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Default)]
struct VerdictCounts {
    accepted: usize,
    low_quality: usize,
    redundant: usize,
    other: usize,
}

impl VerdictCounts {
    fn count(&mut self, verdict: FrameVerdict) {
        match verdict {
            FrameVerdict::Accepted { .. } => self.accepted += 1,
            FrameVerdict::LowQuality { .. } => self.low_quality += 1,
            FrameVerdict::NoMovement | FrameVerdict::NoChange => self.redundant += 1,
            FrameVerdict::NotRecording | FrameVerdict::WidthMismatch => self.other += 1,
        }
    }
}

pub(crate) fn run(arg: &RecordArg) -> anyhow::Result<()> {
    let RecordArg {
        store,
        config,
        sessions,
        frames,
        noise,
        seed,
    } = arg;
    let config = util::load_config(config.as_deref())?;
    let mut store = util::open_store(store, &config)?;
    let rng = match seed {
        Some(seed) => Pcg64Mcg::seed_from_u64(*seed),
        None => Pcg64Mcg::from_rng(&mut rand::rng()),
    };
    let mut operator = ScriptedOperator::new(*noise, rng);
    let course = Course::standard();
    let started = Utc::now().format("%Y%m%d_%H%M%S");

    for index in 0..*sessions {
        let name = format!("operator_{started}_{index:02}");
        store.start_recording(Some(name.clone()));
        let mut run = course.start();
        let mut counts = VerdictCounts::default();
        for _ in 0..*frames {
            if !run.is_alive() {
                break;
            }
            let sensors = run.sensors();
            let actions = operator.act(&run, &sensors);
            let sample = FrameSample {
                sensors,
                actions,
                position: run.position_3d(),
                timestamp: run.elapsed(),
            };
            counts.count(store.record_frame_verdict(&sample));
            run.step(&sample.actions);
        }
        debug!(session = %name, ?counts, "frame verdicts");

        let fitness = run.fitness();
        let retained = store.finalize_session(fitness).is_some();
        info!(
            session = %name,
            fitness,
            frames = counts.accepted,
            checkpoints = run.checkpoints_reached(),
            collisions = run.collisions(),
            alive = run.is_alive(),
            retained,
            "session recorded"
        );
    }

    info!(
        sessions = store.len(),
        frames = store.total_frames_available(),
        best = store.best().map(|s| s.total_fitness),
        "demonstration store updated"
    );
    Ok(())
}
