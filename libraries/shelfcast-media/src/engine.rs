//! The probe/convert capability the rest of the system is written against.
//!
//! The exact command line used to probe or convert audio is an injection
//! point: production wires in [`crate::FfmpegEngine`], tests wire in a stub
//! that writes scripted results. Nothing outside this crate spawns a
//! process.

use crate::error::Result;
use async_trait::async_trait;
use shelfcast_core::ProbeData;
use std::path::Path;

/// Progress callback: `(out_time_ms, speed)`, both optional because the
/// engine may learn them at different moments. Expected at >= 1 Hz while a
/// conversion runs.
pub type ProgressSink<'a> = &'a (dyn Fn(Option<u64>, Option<f64>) + Send + Sync);

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Read format duration, the container-level tag dictionary, and the
    /// embedded chapter list without decoding audio.
    async fn probe(&self, path: &Path) -> Result<ProbeData>;

    /// Produce a normalized MPEG audio file at `target` carrying the
    /// source's metadata and chapter marks, with `cover` attached when
    /// supplied.
    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        cover: Option<&Path>,
        on_progress: ProgressSink<'_>,
    ) -> Result<()>;

    /// Extract embedded cover art from `source` into `target`.
    async fn extract_cover(&self, source: &Path, target: &Path) -> Result<()>;
}
