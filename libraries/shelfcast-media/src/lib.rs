//! Shelfcast Media
//!
//! Everything that touches audio bytes: the pluggable probe/convert engine
//! and its ffmpeg implementation, the persistent probe cache, the ID3v2.4
//! chapter-tag encoder, and the virtual stream assembler that answers byte
//! range requests over `tag ‖ audio`.

#![forbid(unsafe_code)]

pub mod assembly;
pub mod chapter_tag;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod probe_cache;
pub mod range;

pub use assembly::{plan, stream_body, virtual_size, BodyPlan, FileSlice, StreamPlan};
pub use chapter_tag::CoverArt;
pub use engine::AudioEngine;
pub use error::{MediaError, Result};
pub use ffmpeg::FfmpegEngine;
pub use probe_cache::ProbeCache;
pub use range::RangeRequest;
