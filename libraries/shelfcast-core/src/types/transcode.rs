/// Transcode state: the lifecycle of one container normalization.
use super::book::ChapterTiming;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeState {
    Pending,
    Working,
    Done,
    Failed,
}

impl TranscodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Snapshot of the Book fields needed to promote a finished transcode into
/// the library index without rescanning the source directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMeta {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epub_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterTiming>>,
}

/// State of one source container's normalization.
///
/// Identity is `(source, mtime_ms)`: when the source file's mtime on disk no
/// longer matches, the record is stale and is discarded by the next scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeStatus {
    pub source: PathBuf,
    pub target: PathBuf,
    pub mtime_ms: i64,
    pub state: TranscodeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last progress sample: output timestamp reached, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_time_ms: Option<u64>,
    /// Last progress sample: realtime speed multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Expected total duration, for percent display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BookMeta>,
}

impl TranscodeStatus {
    pub fn pending(source: PathBuf, target: PathBuf, mtime_ms: i64, meta: BookMeta) -> Self {
        Self {
            source,
            target,
            mtime_ms,
            state: TranscodeState::Pending,
            error: None,
            out_time_ms: None,
            speed: None,
            duration_ms: meta.duration_seconds.map(|s| (s * 1000.0) as u64),
            meta: Some(meta),
        }
    }

    pub fn failed(source: PathBuf, target: PathBuf, mtime_ms: i64, error: impl Into<String>) -> Self {
        Self {
            source,
            target,
            mtime_ms,
            state: TranscodeState::Failed,
            error: Some(error.into()),
            out_time_ms: None,
            speed: None,
            duration_ms: None,
            meta: None,
        }
    }

    /// Fraction of the transcode completed, when both samples are known.
    pub fn progress_percent(&self) -> Option<f64> {
        let out = self.out_time_ms? as f64;
        let total = self.duration_ms? as f64;
        if total <= 0.0 {
            return None;
        }
        Some((out / total * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_takes_duration_from_meta() {
        let meta = BookMeta {
            id: "a-b".into(),
            title: "B".into(),
            author: "A".into(),
            duration_seconds: Some(3600.0),
            ..Default::default()
        };
        let status = TranscodeStatus::pending("/s.m4b".into(), "/t.mp3".into(), 123, meta);
        assert_eq!(status.state, TranscodeState::Pending);
        assert_eq!(status.duration_ms, Some(3_600_000));
    }

    #[test]
    fn percent_needs_both_samples() {
        let mut status =
            TranscodeStatus::failed("/s.m4b".into(), "/t.mp3".into(), 123, "probe failed");
        assert_eq!(status.progress_percent(), None);
        status.out_time_ms = Some(30_000);
        status.duration_ms = Some(60_000);
        assert_eq!(status.progress_percent(), Some(50.0));
    }
}
