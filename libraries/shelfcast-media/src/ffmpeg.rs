//! ffprobe/ffmpeg implementation of the engine contract.

use crate::engine::{AudioEngine, ProgressSink};
use crate::error::{MediaError, Result};
use async_trait::async_trait;
use shelfcast_core::{ProbeChapter, ProbeData, TagMap};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both tools from `PATH`.
    pub fn from_path() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::from_path()
    }
}

#[async_trait]
impl AudioEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> Result<ProbeData> {
        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_chapters")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::engine("ffprobe", stderr.trim().to_string()));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::parse("ffprobe", e.to_string()))?;
        Ok(parse_probe_json(&value))
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        cover: Option<&Path>,
        on_progress: ProgressSink<'_>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-nostdin").arg("-y").arg("-i").arg(source);

        if let Some(cover) = cover {
            cmd.arg("-i")
                .arg(cover)
                .arg("-map")
                .arg("0:a")
                .arg("-map")
                .arg("1:v")
                .arg("-codec:v")
                .arg("copy")
                .arg("-disposition:v:0")
                .arg("attached_pic");
        }

        cmd.arg("-map_metadata")
            .arg("0")
            .arg("-map_chapters")
            .arg("0")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-q:a")
            .arg("2")
            .arg("-id3v2_version")
            .arg("4")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostats")
            .arg("-progress")
            .arg("pipe:1")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(source = %source.display(), target = %target.display(), "spawning ffmpeg");
        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take().expect("stdout piped");
        let mut stderr = child.stderr.take().expect("stderr piped");

        let progress = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut out_time_ms: Option<u64> = None;
            let mut speed: Option<f64> = None;
            while let Ok(Some(line)) = lines.next_line().await {
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                match key.trim() {
                    // ffmpeg reports microseconds under both out_time_us
                    // and out_time_ms
                    "out_time_us" | "out_time_ms" => {
                        if let Ok(us) = value.trim().parse::<i64>() {
                            out_time_ms = Some((us.max(0) as u64) / 1000);
                        }
                    }
                    "speed" => {
                        speed = value.trim().trim_end_matches('x').parse::<f64>().ok();
                    }
                    "progress" => {
                        on_progress(out_time_ms, speed);
                    }
                    _ => {}
                }
            }
        };

        let stderr_text = async {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        };

        let (_, stderr_text) = tokio::join!(progress, stderr_text);
        let status = child.wait().await?;

        if !status.success() {
            return Err(MediaError::engine("ffmpeg", stderr_text.trim().to_string()));
        }
        Ok(())
    }

    async fn extract_cover(&self, source: &Path, target: &Path) -> Result<()> {
        let output = Command::new(&self.ffmpeg)
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-an")
            .arg("-codec:v")
            .arg("copy")
            .arg("-frames:v")
            .arg("1")
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::engine("ffmpeg", stderr.trim().to_string()));
        }
        let size = tokio::fs::metadata(target).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::engine("ffmpeg", "no cover stream in source"));
        }
        Ok(())
    }
}

/// Map ffprobe's JSON document onto `ProbeData`.
///
/// ffprobe encodes numbers as strings (`"duration": "3600.000000"`), and
/// tag dictionaries appear with inconsistent key casing across containers.
fn parse_probe_json(value: &serde_json::Value) -> ProbeData {
    let mut data = ProbeData::default();

    if let Some(format) = value.get("format") {
        data.duration = format
            .get("duration")
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok());
        if let Some(tags) = format.get("tags").and_then(|t| t.as_object()) {
            for (key, value) in tags {
                if let Some(value) = value.as_str() {
                    data.tags.insert(key, value);
                }
            }
        }
    }

    if let Some(chapters) = value.get("chapters").and_then(|c| c.as_array()) {
        for chapter in chapters {
            let start = chapter
                .get("start_time")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            let end = chapter
                .get("end_time")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            let (Some(start_time), Some(end_time)) = (start, end) else {
                continue;
            };
            let mut tags = TagMap::new();
            if let Some(map) = chapter.get("tags").and_then(|t| t.as_object()) {
                for (key, value) in map {
                    if let Some(value) = value.as_str() {
                        tags.insert(key, value);
                    }
                }
            }
            data.chapters.push(ProbeChapter {
                start_time,
                end_time,
                tags,
            });
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_document() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{
                "format": {
                    "duration": "3600.500000",
                    "tags": {"TITLE": "The Book", "Artist": "The Author"}
                },
                "chapters": [
                    {"start_time": "0.000000", "end_time": "10.500000", "tags": {"title": "Intro"}},
                    {"start_time": "10.500000", "end_time": "3600.500000"}
                ]
            }"#,
        )
        .unwrap();

        let data = parse_probe_json(&json);
        assert_eq!(data.duration, Some(3600.5));
        assert_eq!(data.tags.get("title"), Some("The Book"));
        assert_eq!(data.tags.get("artist"), Some("The Author"));
        assert_eq!(data.chapters.len(), 2);
        assert_eq!(data.chapters[0].tags.get("title"), Some("Intro"));
        assert_eq!(data.chapters[1].end_time, 3600.5);
    }

    #[test]
    fn missing_sections_yield_empty_data() {
        let data = parse_probe_json(&serde_json::json!({}));
        assert_eq!(data.duration, None);
        assert!(data.tags.is_empty());
        assert!(data.chapters.is_empty());
    }
}
