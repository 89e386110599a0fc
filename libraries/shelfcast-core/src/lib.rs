//! Shelfcast Core
//!
//! Domain types, persistence, and in-memory state stores shared by the
//! scanner, the media pipeline, and the HTTP server.
//!
//! The core owns three persisted documents (library index, transcode state,
//! probe cache records) and the transcode job queue. Components receive the
//! pieces they need as `Arc`s; nothing in this crate touches the network or
//! spawns processes.

#![forbid(unsafe_code)]

pub mod error;
pub mod fsmeta;
pub mod index;
pub mod persist;
pub mod queue;
pub mod slug;
pub mod tags;
pub mod transcode;
pub mod types;

pub use error::{CoreError, Result};
pub use index::LibraryIndex;
pub use queue::{job_queue, JobReceiver, JobSender, TranscodeJob};
pub use slug::{base36_ms, slugify};
pub use tags::TagMap;
pub use transcode::TranscodeStore;
pub use types::{
    AudioMime, AudioSegment, Book, BookMeta, BookSource, ChapterTiming, PartInput, ProbeChapter,
    ProbeData, ProbeRecord, TranscodeState, TranscodeStatus,
};
