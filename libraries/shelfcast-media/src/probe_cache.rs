//! Persistent memo of probe results.
//!
//! Keyed by path; `(path, mtime_ms)` is the identity. Every engine result,
//! success or failure, is recorded and written to `probe-cache.json`
//! immediately, so the cache is crash-durable and a file that failed to
//! probe is not retried on every scan.

use crate::engine::AudioEngine;
use shelfcast_core::persist::{atomic_write_json, load_json_or_default};
use shelfcast_core::{ChapterTiming, ProbeData, ProbeRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ProbeCache {
    path: PathBuf,
    entries: HashMap<PathBuf, ProbeRecord>,
    engine: Arc<dyn AudioEngine>,
}

impl ProbeCache {
    pub fn load(data_dir: &Path, engine: Arc<dyn AudioEngine>) -> Self {
        let path = data_dir.join("probe-cache.json");
        let records: Vec<ProbeRecord> = load_json_or_default(&path);
        let entries: HashMap<PathBuf, ProbeRecord> =
            records.into_iter().map(|r| (r.file.clone(), r)).collect();
        if !entries.is_empty() {
            info!(count = entries.len(), "loaded probe cache");
        }
        Self {
            path,
            entries,
            engine,
        }
    }

    /// Probe `path`, reusing the cached result when `mtime_ms` matches.
    ///
    /// Returns `None` when probing failed (now or in a cached earlier run).
    pub async fn probe(&mut self, path: &Path, mtime_ms: i64) -> Option<ProbeData> {
        if let Some(record) = self.entries.get(path) {
            if record.mtime_ms == mtime_ms {
                return record.data.clone();
            }
            debug!(path = %path.display(), "probe cache entry stale, re-probing");
        }

        let (data, error) = match self.engine.probe(path).await {
            Ok(data) => (Some(data), None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "probe failed");
                (None, Some(e.to_string()))
            }
        };

        self.entries.insert(
            path.to_path_buf(),
            ProbeRecord {
                file: path.to_path_buf(),
                mtime_ms,
                data: data.clone(),
                error,
            },
        );
        self.persist();
        data
    }

    /// Probed duration in seconds, if known.
    pub async fn duration(&mut self, path: &Path, mtime_ms: i64) -> Option<f64> {
        self.probe(path, mtime_ms).await?.duration
    }

    /// The embedded chapter list as millisecond timings.
    ///
    /// Seconds are converted with 1000x rounding; a chapter without a title
    /// gets `"Chapter {n}"`.
    pub async fn chapters(&mut self, path: &Path, mtime_ms: i64) -> Option<Vec<ChapterTiming>> {
        let data = self.probe(path, mtime_ms).await?;
        if data.chapters.is_empty() {
            return None;
        }
        let chapters = data
            .chapters
            .iter()
            .enumerate()
            .map(|(i, ch)| ChapterTiming {
                id: format!("ch{i}"),
                title: ch
                    .tags
                    .present("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Chapter {}", i + 1)),
                start_ms: (ch.start_time * 1000.0).round() as u64,
                end_ms: (ch.end_time * 1000.0).round() as u64,
            })
            .collect();
        Some(chapters)
    }

    /// Entries whose probe failed, for the operator status page.
    pub fn failures(&self) -> Vec<(PathBuf, String)> {
        let mut failures: Vec<(PathBuf, String)> = self
            .entries
            .values()
            .filter(|r| r.data.is_none())
            .filter_map(|r| {
                let error = r.error.as_deref()?.trim();
                (!error.is_empty()).then(|| (r.file.clone(), error.to_string()))
            })
            .collect();
        failures.sort();
        failures
    }

    fn persist(&self) {
        let mut records: Vec<&ProbeRecord> = self.entries.values().collect();
        records.sort_by(|a, b| a.file.cmp(&b.file));
        if let Err(e) = atomic_write_json(&self.path, &records) {
            warn!(error = %e, "failed to persist probe cache");
        }
    }
}
