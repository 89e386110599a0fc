/// Book: one addressable audiobook as presented by the server.
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// MIME type of the streamable audio, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioMime {
    #[serde(rename = "audio/mpeg")]
    Mpeg,
    #[serde(rename = "audio/mp4")]
    Mp4,
}

impl AudioMime {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "mp3" => Some(Self::Mpeg),
            "m4a" | "m4b" | "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mpeg => "audio/mpeg",
            Self::Mp4 => "audio/mp4",
        }
    }
}

/// One part's byte and time extents within the virtual concatenation.
///
/// `start`/`end` are inclusive absolute offsets into the audio portion of
/// the stream (the synthesized tag prefix is not counted here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub start: u64,
    pub end: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A row in a book's chapter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterTiming {
    pub id: String,
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Scanner-facing description of one audio file before offsets are assigned.
#[derive(Debug, Clone)]
pub struct PartInput {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub duration_ms: u64,
    pub title: Option<String>,
}

/// The two shapes a book can take on disk.
///
/// Exactly one of `primary file` / `part list` exists, enforced by
/// construction rather than by optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BookSource {
    /// One normalized container served directly.
    Single {
        file: AudioSegment,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chapters: Option<Vec<ChapterTiming>>,
    },
    /// Ordered parts stitched virtually behind a synthesized chapter tag.
    Multi {
        files: Vec<AudioSegment>,
        chapters: Vec<ChapterTiming>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub mime: AudioMime,
    /// Byte size of the audio alone; excludes the synthesized tag prefix.
    pub total_size: u64,
    #[serde(flatten)]
    pub source: BookSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epub_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Recomputed from filesystem times each run; never persisted.
    #[serde(skip)]
    pub added_at: Option<DateTime<Utc>>,
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
}

impl Book {
    /// Build a multi-part book from ordered parts.
    ///
    /// Assigns contiguous byte offsets covering `[0, total_size)` and a
    /// chapter table with one entry per part at cumulative millisecond
    /// offsets. Parts with zero size or zero duration are the caller's
    /// problem; they are rejected here so a malformed book can never be
    /// constructed.
    pub fn multi(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        parts: Vec<PartInput>,
    ) -> Result<Self, CoreError> {
        let id = id.into();
        if parts.is_empty() {
            return Err(CoreError::invalid_book(&id, "multi book has no parts"));
        }

        let mut files = Vec::with_capacity(parts.len());
        let mut chapters = Vec::with_capacity(parts.len());
        let mut byte_offset: u64 = 0;
        let mut ms_offset: u64 = 0;

        for (i, part) in parts.iter().enumerate() {
            if part.size == 0 {
                return Err(CoreError::invalid_book(
                    &id,
                    format!("part {} is empty", part.name),
                ));
            }
            let chapter_title = part
                .title
                .clone()
                .unwrap_or_else(|| format!("Chapter {}", i + 1));
            files.push(AudioSegment {
                path: part.path.clone(),
                name: part.name.clone(),
                size: part.size,
                start: byte_offset,
                end: byte_offset + part.size - 1,
                duration_ms: part.duration_ms,
                title: part.title.clone(),
            });
            chapters.push(ChapterTiming {
                id: format!("ch{i}"),
                title: chapter_title,
                start_ms: ms_offset,
                end_ms: ms_offset + part.duration_ms,
            });
            byte_offset += part.size;
            ms_offset += part.duration_ms;
        }

        let mime = AudioMime::from_path(&parts[0].path).unwrap_or(AudioMime::Mpeg);

        Ok(Self {
            id,
            title: title.into(),
            author: author.into(),
            mime,
            total_size: byte_offset,
            source: BookSource::Multi { files, chapters },
            cover_path: None,
            epub_path: None,
            duration_seconds: Some(ms_offset as f64 / 1000.0),
            published_at: None,
            added_at: None,
            description: None,
            description_html: None,
            language: None,
            isbn: None,
            identifiers: BTreeMap::new(),
        })
    }

    /// Build a single-container book over one file on disk.
    pub fn single(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        file: PartInput,
        chapters: Option<Vec<ChapterTiming>>,
    ) -> Self {
        let mime = AudioMime::from_path(&file.path).unwrap_or(AudioMime::Mpeg);
        let duration_seconds = (file.duration_ms > 0).then(|| file.duration_ms as f64 / 1000.0);
        let segment = AudioSegment {
            start: 0,
            end: file.size.saturating_sub(1),
            path: file.path,
            name: file.name,
            size: file.size,
            duration_ms: file.duration_ms,
            title: file.title,
        };
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            mime,
            total_size: segment.size,
            source: BookSource::Single {
                file: segment,
                chapters,
            },
            cover_path: None,
            epub_path: None,
            duration_seconds,
            published_at: None,
            added_at: None,
            description: None,
            description_html: None,
            language: None,
            isbn: None,
            identifiers: BTreeMap::new(),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self.source, BookSource::Multi { .. })
    }

    pub fn kind_str(&self) -> &'static str {
        match self.source {
            BookSource::Single { .. } => "single",
            BookSource::Multi { .. } => "multi",
        }
    }

    /// Ordered parts for a multi book; a one-element slice for a single.
    pub fn files(&self) -> &[AudioSegment] {
        match &self.source {
            BookSource::Single { file, .. } => std::slice::from_ref(file),
            BookSource::Multi { files, .. } => files,
        }
    }

    pub fn primary_file(&self) -> Option<&AudioSegment> {
        match &self.source {
            BookSource::Single { file, .. } => Some(file),
            BookSource::Multi { .. } => None,
        }
    }

    pub fn chapters(&self) -> Option<&[ChapterTiming]> {
        match &self.source {
            BookSource::Single { chapters, .. } => chapters.as_deref(),
            BookSource::Multi { chapters, .. } => Some(chapters),
        }
    }

    /// A book reaches the feed only when it can actually be streamed.
    pub fn is_streamable(&self) -> bool {
        match &self.source {
            BookSource::Single { file, .. } => file.path.exists(),
            BookSource::Multi { files, .. } => files.iter().any(|f| f.size > 0),
        }
    }

    /// Key used to order the feed: newest first by `added_at`, falling back
    /// to `published_at`.
    pub fn feed_sort_key(&self) -> Option<DateTime<Utc>> {
        self.added_at.or(self.published_at)
    }
}
