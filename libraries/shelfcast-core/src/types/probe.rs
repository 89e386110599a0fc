/// Probe results: what the external engine reports about one audio file.
use crate::tags::TagMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One embedded chapter as reported by the probe engine, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeChapter {
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub tags: TagMap,
}

/// Format-level data for one file: duration, tag dictionary, chapter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "TagMap::is_empty")]
    pub tags: TagMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapters: Vec<ProbeChapter>,
}

/// Persisted cache entry. `(file, mtime_ms)` is the identity; a record whose
/// mtime no longer matches the file on disk is stale. Failures are cached
/// too, with `data` absent and `error` set, so a broken file is not
/// re-probed on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub file: PathBuf,
    pub mtime_ms: i64,
    pub data: Option<ProbeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
