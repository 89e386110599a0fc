//! Domain types shared across the workspace.

mod book;
mod probe;
mod transcode;

pub use book::{AudioMime, AudioSegment, Book, BookSource, ChapterTiming, PartInput};
pub use probe::{ProbeChapter, ProbeData, ProbeRecord};
pub use transcode::{BookMeta, TranscodeState, TranscodeStatus};
