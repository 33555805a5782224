use std::{
    io::{self, Write as _},
    path::Path,
};

use anyhow::Context as _;
use mimic_imitation::{
    DemonstrationRecorder, DemonstrationStore, DirectoryStorage, ImitationConfig, RecorderSettings,
};

/// Loads the engine configuration, or the defaults when no file is given.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<ImitationConfig> {
    let Some(path) = path else {
        return Ok(ImitationConfig::default());
    };
    ImitationConfig::from_json_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Opens the on-disk demonstration store, applying the retention policy.
pub(crate) fn open_store(dir: &Path, config: &ImitationConfig) -> anyhow::Result<DemonstrationStore> {
    let storage = DirectoryStorage::open(dir)
        .with_context(|| format!("Failed to open demonstration directory: {}", dir.display()))?;
    DemonstrationStore::open(
        Box::new(storage),
        DemonstrationRecorder::new(RecorderSettings::from_config(config)),
        config.max_saved_sessions,
    )
    .with_context(|| format!("Failed to load demonstrations from {}", dir.display()))
}

/// Writes pretty JSON to stdout.
pub(crate) fn print_json<T>(value: &T) -> anyhow::Result<()>
where
    T: serde::Serialize,
{
    let mut writer = io::stdout().lock();
    serde_json::to_writer_pretty(&mut writer, value).context("Failed to write JSON to stdout")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
