//! Where demonstration sessions are persisted.
//!
//! [`DirectoryStorage`] keeps one pretty-printed JSON file per session.
//! [`MemoryStorage`] keeps them in a map, for tests and for embedding the
//! engine without a filesystem.

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::demonstration::DemonstrationSession;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum StorageError {
    #[display("failed to access session storage {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to serialize session {key}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

/// A session as found in storage, with the key it is stored under.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub key: String,
    pub session: DemonstrationSession,
}

pub trait SessionStorage: fmt::Debug {
    /// Loads every readable session.
    ///
    /// Entries that cannot be parsed are skipped with a warning; only a
    /// failure to enumerate the storage itself is an error.
    fn load_all(&mut self) -> Result<Vec<StoredSession>, StorageError>;

    fn save(&mut self, key: &str, session: &DemonstrationSession) -> Result<(), StorageError>;

    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Uses `dir` for session files, creating it if needed.
    pub fn open<P>(dir: P) -> Result<Self, StorageError>
    where
        P: Into<PathBuf>,
    {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStorage for DirectoryStorage {
    fn load_all(&mut self) -> Result<Vec<StoredSession>, StorageError> {
        let io_error = |source: io::Error| StorageError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut sessions = vec![];
        for entry in fs::read_dir(&self.dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_owned) else {
                continue;
            };
            match read_session(&path) {
                Ok(session) => match session.sanitized() {
                    Some(session) => sessions.push(StoredSession { key, session }),
                    None => warn!(path = %path.display(), "skipping session file without usable frames"),
                },
                Err(err) => warn!(path = %path.display(), "skipping malformed session file: {err}"),
            }
        }
        Ok(sessions)
    }

    fn save(&mut self, key: &str, session: &DemonstrationSession) -> Result<(), StorageError> {
        let path = self.path_of(key);
        let io_error = |source: io::Error| StorageError::Io {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, session).map_err(|source| {
            StorageError::Serialize {
                key: key.to_owned(),
                source,
            }
        })?;
        writeln!(writer).map_err(io_error)?;
        writer.flush().map_err(io_error)
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_of(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

fn read_session(path: &Path) -> Result<DemonstrationSession, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    sessions: BTreeMap<String, DemonstrationSession>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }
}

impl SessionStorage for MemoryStorage {
    fn load_all(&mut self) -> Result<Vec<StoredSession>, StorageError> {
        Ok(self
            .sessions
            .iter()
            .map(|(key, session)| StoredSession {
                key: key.clone(),
                session: session.clone(),
            })
            .collect())
    }

    fn save(&mut self, key: &str, session: &DemonstrationSession) -> Result<(), StorageError> {
        self.sessions.insert(key.to_owned(), session.clone());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.sessions.remove(key);
        Ok(())
    }
}
