//! Persistent transcode state, keyed by source container path.
//!
//! Records survive restarts via `transcode-status.json`. The in-memory
//! queued set is deliberately not persisted: after a crash nothing is in
//! flight, and the next scan re-enqueues whatever is still pending.

use crate::error::Result;
use crate::persist::{atomic_write_json, load_json_or_default};
use crate::types::{TranscodeState, TranscodeStatus};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub working: usize,
    pub done: usize,
    pub failed: usize,
}

pub struct TranscodeStore {
    path: PathBuf,
    records: HashMap<PathBuf, TranscodeStatus>,
    /// Sources currently enqueued or being worked; guards double-enqueue.
    queued: HashSet<PathBuf>,
}

impl TranscodeStore {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("transcode-status.json");
        let records: Vec<TranscodeStatus> = load_json_or_default(&path);
        let records: HashMap<PathBuf, TranscodeStatus> = records
            .into_iter()
            .map(|r| (r.source.clone(), r))
            .collect();
        if !records.is_empty() {
            info!(count = records.len(), "loaded transcode state");
        }
        Self {
            path,
            records,
            queued: HashSet::new(),
        }
    }

    pub fn get(&self, source: &Path) -> Option<&TranscodeStatus> {
        self.records.get(source)
    }

    /// Current record iff its stored mtime still matches `mtime_ms`.
    pub fn get_current(&self, source: &Path, mtime_ms: i64) -> Option<&TranscodeStatus> {
        self.records.get(source).filter(|r| r.mtime_ms == mtime_ms)
    }

    pub fn upsert(&mut self, status: TranscodeStatus) {
        self.records.insert(status.source.clone(), status);
    }

    /// Mutate the record for `source` in place, if present.
    pub fn update<F: FnOnce(&mut TranscodeStatus)>(&mut self, source: &Path, f: F) {
        if let Some(record) = self.records.get_mut(source) {
            f(record);
        }
    }

    pub fn remove(&mut self, source: &Path) -> Option<TranscodeStatus> {
        self.records.remove(source)
    }

    /// Drop records whose sources a completed scan no longer references.
    /// Failed items stay visible until then, which is what the status page
    /// wants.
    pub fn retain_sources(&mut self, seen: &HashSet<PathBuf>) {
        self.records.retain(|source, _| seen.contains(source));
    }

    pub fn mark_queued(&mut self, source: &Path) -> bool {
        self.queued.insert(source.to_path_buf())
    }

    pub fn unmark_queued(&mut self, source: &Path) {
        self.queued.remove(source);
    }

    pub fn is_queued(&self, source: &Path) -> bool {
        self.queued.contains(source)
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for record in self.records.values() {
            match record.state {
                TranscodeState::Pending => counts.pending += 1,
                TranscodeState::Working => counts.working += 1,
                TranscodeState::Done => counts.done += 1,
                TranscodeState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// The record being transcoded right now, if any.
    pub fn active(&self) -> Option<&TranscodeStatus> {
        self.records
            .values()
            .find(|r| r.state == TranscodeState::Working)
    }

    pub fn records(&self) -> impl Iterator<Item = &TranscodeStatus> {
        self.records.values()
    }

    pub fn persist(&self) -> Result<()> {
        let mut records: Vec<&TranscodeStatus> = self.records.values().collect();
        records.sort_by(|a, b| a.source.cmp(&b.source));
        atomic_write_json(&self.path, &records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookMeta;

    fn meta(id: &str) -> BookMeta {
        BookMeta {
            id: id.into(),
            title: "T".into(),
            author: "A".into(),
            ..Default::default()
        }
    }

    #[test]
    fn mtime_mismatch_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscodeStore::load(dir.path());
        store.upsert(TranscodeStatus::pending(
            "/a.m4b".into(),
            "/out.mp3".into(),
            100,
            meta("a"),
        ));
        assert!(store.get_current(Path::new("/a.m4b"), 100).is_some());
        assert!(store.get_current(Path::new("/a.m4b"), 200).is_none());
    }

    #[test]
    fn persist_then_load_keeps_states() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscodeStore::load(dir.path());
        let mut status =
            TranscodeStatus::pending("/a.m4b".into(), "/out.mp3".into(), 100, meta("a"));
        status.state = TranscodeState::Done;
        store.upsert(status);
        store.upsert(TranscodeStatus::failed(
            "/b.m4b".into(),
            "/out-b.mp3".into(),
            7,
            "no duration",
        ));
        store.persist().unwrap();

        let reloaded = TranscodeStore::load(dir.path());
        assert_eq!(reloaded.get(Path::new("/a.m4b")).unwrap().state, TranscodeState::Done);
        assert_eq!(reloaded.get(Path::new("/a.m4b")).unwrap().mtime_ms, 100);
        let failed = reloaded.get(Path::new("/b.m4b")).unwrap();
        assert_eq!(failed.state, TranscodeState::Failed);
        assert_eq!(failed.error.as_deref(), Some("no duration"));
        // queued set does not survive restarts
        assert!(!reloaded.is_queued(Path::new("/a.m4b")));
    }

    #[test]
    fn retain_drops_vanished_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscodeStore::load(dir.path());
        store.upsert(TranscodeStatus::failed("/a.m4b".into(), "/o.mp3".into(), 1, "x"));
        store.upsert(TranscodeStatus::failed("/b.m4b".into(), "/o2.mp3".into(), 1, "y"));

        let mut seen = HashSet::new();
        seen.insert(PathBuf::from("/a.m4b"));
        store.retain_sources(&seen);
        assert!(store.get(Path::new("/a.m4b")).is_some());
        assert!(store.get(Path::new("/b.m4b")).is_none());
    }

    #[test]
    fn counts_by_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscodeStore::load(dir.path());
        store.upsert(TranscodeStatus::pending("/a.m4b".into(), "/o.mp3".into(), 1, meta("a")));
        store.upsert(TranscodeStatus::failed("/b.m4b".into(), "/o2.mp3".into(), 1, "x"));
        let counts = store.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.done, 0);
    }

    #[test]
    fn queued_set_guards_double_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TranscodeStore::load(dir.path());
        assert!(store.mark_queued(Path::new("/a.m4b")));
        assert!(!store.mark_queued(Path::new("/a.m4b")));
        store.unmark_queued(Path::new("/a.m4b"));
        assert!(store.mark_queued(Path::new("/a.m4b")));
    }
}
