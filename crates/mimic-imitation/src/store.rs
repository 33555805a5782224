//! Durable, fitness-ranked demonstration material.
//!
//! The store keeps at most `capacity` sessions. Every insertion re-ranks
//! the retained sessions together with the newcomer by total fitness
//! (descending, earlier insertion winning ties) and keeps the top
//! `capacity`. Sessions that fall out are deleted from storage; a newcomer
//! that does not make the cut is never written at all.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    demonstration::{DemonstrationSession, FrameSample},
    recorder::{DemonstrationRecorder, FrameVerdict},
    storage::{SessionStorage, StorageError},
};

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    seq: u64,
    session: DemonstrationSession,
}

#[derive(Debug)]
pub struct DemonstrationStore {
    storage: Box<dyn SessionStorage>,
    recorder: DemonstrationRecorder,
    capacity: usize,
    entries: Vec<Entry>,
    next_seq: u64,
}

impl DemonstrationStore {
    /// Opens a store over `storage` and loads the sessions already there.
    ///
    /// Loaded sessions are sequenced by creation timestamp, then name, and
    /// the retention policy is applied to them immediately, so a storage
    /// holding more than `capacity` sessions is trimmed on open.
    pub fn open(
        mut storage: Box<dyn SessionStorage>,
        recorder: DemonstrationRecorder,
        capacity: usize,
    ) -> Result<Self, StorageError> {
        let mut loaded = storage.load_all()?;
        loaded.sort_by(|a, b| {
            a.session
                .timestamp
                .cmp(&b.session.timestamp)
                .then_with(|| a.session.session_name.cmp(&b.session.session_name))
        });
        let entries = loaded
            .into_iter()
            .zip(0..)
            .map(|(stored, seq)| Entry {
                key: stored.key,
                seq,
                session: stored.session,
            })
            .collect::<Vec<_>>();
        let next_seq = entries.len() as u64;
        let mut store = Self {
            storage,
            recorder,
            capacity: capacity.max(1),
            entries,
            next_seq,
        };
        let evicted = store.rank_and_truncate();
        store.delete_all(&evicted);
        info!(
            sessions = store.entries.len(),
            frames = store.total_frames_available(),
            "demonstration store opened"
        );
        Ok(store)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Starts recording a new session named after the current time unless
    /// a name is given.
    pub fn start_recording(&mut self, name: Option<String>) {
        let now = Utc::now();
        let name = name.unwrap_or_else(|| format!("demo_{}", now.format("%Y%m%d_%H%M%S")));
        self.recorder.start(name, now);
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    /// Offers one sample to the active recording. Returns whether it was kept.
    pub fn record_frame(&mut self, sample: &FrameSample) -> bool {
        self.record_frame_verdict(sample).is_accepted()
    }

    pub fn record_frame_verdict(&mut self, sample: &FrameSample) -> FrameVerdict {
        self.recorder.record_frame(sample)
    }

    /// Ends the active recording and submits it to the retention policy.
    ///
    /// Returns the session if it was retained.
    pub fn finalize_session(&mut self, total_fitness: f32) -> Option<DemonstrationSession> {
        let session = self.recorder.finish(total_fitness)?;
        self.insert(session)
    }

    /// Submits a session to the retention policy.
    ///
    /// Returns the session if it ranks among the top `capacity` and was
    /// written to storage, `None` otherwise.
    pub fn insert(&mut self, session: DemonstrationSession) -> Option<DemonstrationSession> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = self.unique_key(&session.session_name, seq);
        let previous = self.entries.clone();
        self.entries.push(Entry {
            key: key.clone(),
            seq,
            session,
        });
        let evicted = self.rank_and_truncate();

        if evicted.iter().any(|e| e.seq == seq) {
            debug!(
                session = %key,
                "demonstration session not among the top {}, discarded", self.capacity
            );
            let others = evicted
                .into_iter()
                .filter(|e| e.seq != seq)
                .collect::<Vec<_>>();
            self.delete_all(&others);
            return None;
        }

        let entry = self.entries.iter().find(|e| e.seq == seq)?;
        if let Err(err) = self.storage.save(&entry.key, &entry.session) {
            warn!(session = %key, "failed to persist demonstration session: {err}");
            self.entries = previous;
            return None;
        }
        let session = entry.session.clone();
        info!(
            session = %key,
            fitness = session.total_fitness,
            frames = session.frame_count(),
            "demonstration session saved"
        );
        self.delete_all(&evicted);
        Some(session)
    }

    /// Retained sessions, best first.
    pub fn sessions(&self) -> impl Iterator<Item = &DemonstrationSession> {
        self.entries.iter().map(|e| &e.session)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn best(&self) -> Option<&DemonstrationSession> {
        self.entries.first().map(|e| &e.session)
    }

    #[must_use]
    pub fn top(&self, n: usize) -> Vec<&DemonstrationSession> {
        self.sessions().take(n).collect()
    }

    #[must_use]
    pub fn total_frames_available(&self) -> usize {
        self.sessions().map(DemonstrationSession::frame_count).sum()
    }

    fn rank_and_truncate(&mut self) -> Vec<Entry> {
        self.entries.sort_by(|a, b| {
            b.session
                .total_fitness
                .total_cmp(&a.session.total_fitness)
                .then(a.seq.cmp(&b.seq))
        });
        let keep = self.capacity.min(self.entries.len());
        self.entries.split_off(keep)
    }

    fn delete_all(&mut self, evicted: &[Entry]) {
        for entry in evicted {
            match self.storage.delete(&entry.key) {
                Ok(()) => debug!(
                    session = %entry.key,
                    fitness = entry.session.total_fitness,
                    "demonstration session evicted"
                ),
                Err(err) => warn!(session = %entry.key, "failed to delete evicted session: {err}"),
            }
        }
    }

    fn unique_key(&self, name: &str, seq: u64) -> String {
        let base = sanitize_key(name);
        if self.entries.iter().any(|e| e.key == base) {
            format!("{base}_{seq}")
        } else {
            base
        }
    }
}

fn sanitize_key(name: &str) -> String {
    let key: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "session".to_owned()
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};

    use super::*;
    use crate::{
        demonstration::DemonstrationFrame,
        recorder::RecorderSettings,
        storage::{DirectoryStorage, MemoryStorage},
    };

    fn session(name: &str, fitness: f32) -> DemonstrationSession {
        DemonstrationSession {
            session_name: name.to_owned(),
            timestamp: DateTime::UNIX_EPOCH,
            total_fitness: fitness,
            session_duration: 1.0,
            frames: vec![
                DemonstrationFrame::new(vec![0.5; 8], vec![1.0, 0.0, 0.0, 0.0], 1.0, 0.0),
                DemonstrationFrame::new(vec![0.4; 8], vec![0.0, 1.0, 0.0, 0.0], 1.0, 0.5),
            ],
        }
    }

    fn memory_store(capacity: usize) -> DemonstrationStore {
        DemonstrationStore::open(
            Box::new(MemoryStorage::new()),
            DemonstrationRecorder::new(RecorderSettings::default()),
            capacity,
        )
        .unwrap()
    }

    fn fitnesses(store: &DemonstrationStore) -> Vec<f32> {
        store.sessions().map(|s| s.total_fitness).collect()
    }

    #[test]
    fn test_top_k_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirectoryStorage::open(dir.path()).unwrap();
        let mut store = DemonstrationStore::open(
            Box::new(storage.clone()),
            DemonstrationRecorder::new(RecorderSettings::default()),
            2,
        )
        .unwrap();
        let on_disk = || {
            let mut keys = storage
                .clone()
                .load_all()
                .unwrap()
                .into_iter()
                .map(|s| s.key)
                .collect::<Vec<_>>();
            keys.sort();
            keys
        };

        assert!(store.insert(session("s10", 10.0)).is_some());
        assert!(store.insert(session("s50", 50.0)).is_some());
        assert!(store.insert(session("s30", 30.0)).is_some());
        assert_eq!(fitnesses(&store), vec![50.0, 30.0]);
        assert_eq!(on_disk(), vec!["s30", "s50"]);

        assert!(store.insert(session("s20", 20.0)).is_none());
        assert_eq!(fitnesses(&store), vec![50.0, 30.0]);
        assert_eq!(on_disk(), vec!["s30", "s50"]);

        assert!(store.insert(session("s40", 40.0)).is_some());
        assert_eq!(fitnesses(&store), vec![50.0, 40.0]);
        assert_eq!(on_disk(), vec!["s40", "s50"]);
    }

    #[test]
    fn test_ties_keep_earlier_insertion() {
        let mut store = memory_store(2);
        store.insert(session("first", 10.0));
        store.insert(session("second", 10.0));
        assert!(store.insert(session("third", 10.0)).is_none());
        let names: Vec<_> = store.sessions().map(|s| s.session_name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_top_k_over_random_sequence() {
        let sequence = [3.0, 9.0, 1.0, 9.0, 7.0, 2.0, 8.0, 5.0, 7.0, 6.0];
        let mut store = memory_store(4);
        for (i, f) in sequence.iter().enumerate() {
            store.insert(session(&format!("s{i}"), *f));
        }
        let names: Vec<_> = store.sessions().map(|s| s.session_name.clone()).collect();
        assert_eq!(names, vec!["s1", "s3", "s6", "s4"]);
    }

    #[test]
    fn test_queries() {
        let mut store = memory_store(3);
        assert!(store.best().is_none());
        assert_eq!(store.total_frames_available(), 0);
        store.insert(session("a", 1.0));
        store.insert(session("b", 5.0));
        assert_eq!(store.best().unwrap().session_name, "b");
        assert_eq!(store.top(1).len(), 1);
        assert_eq!(store.top(10).len(), 2);
        assert_eq!(store.total_frames_available(), 4);
    }

    #[test]
    fn test_duplicate_names_get_unique_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DemonstrationStore::open(
            Box::new(DirectoryStorage::open(dir.path()).unwrap()),
            DemonstrationRecorder::new(RecorderSettings::default()),
            3,
        )
        .unwrap();
        store.insert(session("run/1", 1.0));
        store.insert(session("run/1", 2.0));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_open_trims_existing_sessions() {
        let mut storage = MemoryStorage::new();
        for (i, f) in [4.0, 8.0, 6.0].into_iter().enumerate() {
            let mut s = session(&format!("s{i}"), f);
            s.timestamp += TimeDelta::seconds(i64::try_from(i).unwrap());
            storage.save(&s.session_name.clone(), &s).unwrap();
        }
        let store = DemonstrationStore::open(
            Box::new(storage),
            DemonstrationRecorder::new(RecorderSettings::default()),
            2,
        )
        .unwrap();
        assert_eq!(fitnesses(&store), vec![8.0, 6.0]);
    }

    #[test]
    fn test_record_and_finalize() {
        let mut store = memory_store(3);
        assert!(!store.record_frame(&FrameSample {
            sensors: vec![1.0; 8],
            actions: vec![1.0, 0.0, 0.0, 0.0],
            position: [0.0; 3],
            timestamp: 0.0,
        }));
        store.start_recording(Some("manual".to_owned()));
        assert!(store.is_recording());
        assert!(store.record_frame(&FrameSample {
            sensors: vec![1.0; 8],
            actions: vec![1.0, 0.0, 0.0, 0.0],
            position: [0.0; 3],
            timestamp: 0.0,
        }));
        let saved = store.finalize_session(17.0).unwrap();
        assert_eq!(saved.session_name, "manual");
        assert_eq!(store.best().unwrap().total_fitness, 17.0);
    }
}
