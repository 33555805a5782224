use std::path::PathBuf;

use anyhow::Context as _;
use mimic_imitation::{CurriculumStage, DirectoryStorage, SessionStorage as _};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Directory holding demonstration sessions
    #[arg(long)]
    store: PathBuf,
    /// Only show the best N sessions
    #[arg(long)]
    top: Option<usize>,
}

pub(crate) fn run(arg: &InspectArg) -> anyhow::Result<()> {
    let InspectArg { store, top } = arg;
    let mut storage = DirectoryStorage::open(store)
        .with_context(|| format!("Failed to open demonstration directory: {}", store.display()))?;
    let mut sessions = storage
        .load_all()
        .with_context(|| format!("Failed to read demonstrations from {}", store.display()))?;
    sessions.sort_by(|a, b| b.session.total_fitness.total_cmp(&a.session.total_fitness));
    let shown = top.unwrap_or(sessions.len()).min(sessions.len());

    let stages = CurriculumStage::default_stages(1.0);
    println!("{} session(s) in {}", sessions.len(), store.display());
    for (rank, stored) in sessions.iter().take(shown).enumerate() {
        let session = &stored.session;
        let qualities = session
            .frames
            .iter()
            .map(|f| f.frame_quality)
            .collect::<Vec<_>>();
        println!();
        println!("#{:<2} {}", rank + 1, session.session_name);
        println!("    Key:          {}", stored.key);
        println!("    Recorded at:  {}", session.timestamp);
        println!("    Fitness:      {:.3}", session.total_fitness);
        println!("    Duration:     {:.1}s", session.session_duration);
        println!("    Frames:       {}", session.frame_count());
        if let Some(mean) = mimic_stats::mean(&qualities) {
            println!("    Mean quality: {mean:.3}");
        }
        println!("    Admitted frames per stage:");
        for stage in &stages {
            let admitted = session.frames.iter().filter(|f| stage.admits(f)).count();
            println!("      {:<20} {admitted}", stage.name());
        }
    }
    Ok(())
}
