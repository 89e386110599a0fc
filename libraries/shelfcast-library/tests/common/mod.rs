//! Shared fixtures for scanner integration tests.
//!
//! The stub engine reads scripted results out of the fixture files
//! themselves: a part written with `DUR=5;` probes as 5 seconds, a file
//! containing `BAD` fails to probe, and `COVER` marks a file as carrying
//! embedded art.

use async_trait::async_trait;
use shelfcast_core::{ProbeData, TagMap};
use shelfcast_media::engine::{AudioEngine, ProgressSink};
use shelfcast_media::{MediaError, Result};
use std::path::Path;

pub struct StubEngine;

fn read_script(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).into_owned())
}

fn script_value(script: &str, key: &str) -> Option<String> {
    script
        .split(';')
        .find_map(|field| field.strip_prefix(&format!("{key}=")))
        .map(str::to_string)
}

#[async_trait]
impl AudioEngine for StubEngine {
    async fn probe(&self, path: &Path) -> Result<ProbeData> {
        let script = read_script(path).map_err(MediaError::Io)?;
        if script.contains("BAD") {
            return Err(MediaError::engine("ffprobe", "invalid data found"));
        }
        let mut tags = TagMap::new();
        for key in ["title", "artist", "album_artist", "description", "date", "language"] {
            if let Some(value) = script_value(&script, key) {
                tags.insert(key, value);
            }
        }
        Ok(ProbeData {
            duration: script_value(&script, "DUR").and_then(|v| v.parse().ok()),
            tags,
            chapters: Vec::new(),
        })
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        _cover: Option<&Path>,
        on_progress: ProgressSink<'_>,
    ) -> Result<()> {
        let script = read_script(source).map_err(MediaError::Io)?;
        if script.contains("NOCONVERT") {
            return Err(MediaError::engine("ffmpeg", "conversion failed"));
        }
        on_progress(Some(1_000), Some(30.0));
        std::fs::write(target, format!("TRANSCODED;{script}")).map_err(MediaError::Io)?;
        Ok(())
    }

    async fn extract_cover(&self, source: &Path, target: &Path) -> Result<()> {
        let script = read_script(source).map_err(MediaError::Io)?;
        if !script.contains("COVER") {
            return Err(MediaError::engine("ffmpeg", "no cover stream in source"));
        }
        std::fs::write(target, b"jpegbytes").map_err(MediaError::Io)?;
        Ok(())
    }
}

/// Write a fixture audio file of exactly `size` bytes probing as
/// `duration_secs`.
pub fn write_part(path: &Path, size: usize, duration_secs: f64) {
    write_scripted(path, size, &format!("DUR={duration_secs};"));
}

pub fn write_scripted(path: &Path, size: usize, script: &str) {
    let mut bytes = script.as_bytes().to_vec();
    assert!(size >= bytes.len(), "fixture size too small for script");
    bytes.resize(size, b'.');
    std::fs::write(path, bytes).unwrap();
}
