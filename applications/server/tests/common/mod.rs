//! Shared fixtures for server integration tests.

use async_trait::async_trait;
use shelfcast_core::{job_queue, JobReceiver, LibraryIndex, ProbeData, TagMap, TranscodeStore};
use shelfcast_library::{CoverResolver, Scanner};
use shelfcast_media::engine::{AudioEngine, ProgressSink};
use shelfcast_media::{MediaError, ProbeCache, Result};
use shelfcast_server::config::{ChannelConfig, Explicit};
use shelfcast_server::{AppState, ServerConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Mutex, RwLock};

/// Engine scripted by the fixture files themselves: `DUR=n;` sets the
/// probed duration, `BAD` fails the probe, `NOCONVERT` fails conversion,
/// `COVER` marks embedded art.
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
        for key in ["title", "artist", "album_artist", "description", "date"] {
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

pub fn write_scripted(path: &Path, size: usize, script: &str) {
    let mut bytes = script.as_bytes().to_vec();
    assert!(size >= bytes.len(), "fixture size too small for script");
    bytes.resize(size, b'.');
    std::fs::write(path, bytes).unwrap();
}

pub fn test_config(data_dir: &Path) -> ServerConfig {
    ServerConfig {
        data_dir: data_dir.to_path_buf(),
        port: 0,
        channel: ChannelConfig {
            title: "Test Shelf".to_string(),
            description: "Test".to_string(),
            language: "en".to_string(),
            copyright: None,
            author: None,
            owner_name: None,
            owner_email: None,
            explicit: Explicit::No,
            category: None,
            feed_type: "episodic".to_string(),
            image_url: None,
        },
    }
}

pub struct TestServer {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub state: AppState,
    pub scanner: Arc<Scanner>,
    pub jobs_rx: Option<JobReceiver>,
    _root: TempDir,
    _data: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        let root_dir = TempDir::new().unwrap();
        let data_dir = TempDir::new().unwrap();
        let server = Self::over(
            root_dir.path().to_path_buf(),
            data_dir.path().to_path_buf(),
            root_dir,
            data_dir,
        );
        server
    }

    /// Rebuild every store from the same directories, simulating a process
    /// restart.
    pub fn restart(self) -> Self {
        let root = self.root.clone();
        let data = self.data_dir.clone();
        Self::over(root, data, self._root, self._data)
    }

    fn over(root: PathBuf, data_dir: PathBuf, _root: TempDir, _data: TempDir) -> Self {
        let engine: Arc<dyn AudioEngine> = Arc::new(StubEngine);

        let index = Arc::new(RwLock::new(LibraryIndex::load(&data_dir)));
        let transcodes = Arc::new(Mutex::new(TranscodeStore::load(&data_dir)));
        let probes = Arc::new(Mutex::new(ProbeCache::load(&data_dir, Arc::clone(&engine))));
        let (jobs_tx, jobs_rx) = job_queue();

        let state = AppState {
            config: Arc::new(test_config(&data_dir)),
            roots: Arc::new(vec![root.clone()]),
            index: Arc::clone(&index),
            transcodes: Arc::clone(&transcodes),
            probes: Arc::clone(&probes),
            jobs: jobs_tx.clone(),
            api_key: "testkey".to_string(),
        };

        let covers = CoverResolver::new(data_dir.clone(), Arc::clone(&engine));
        let scanner = Arc::new(Scanner::new(
            vec![root.clone()],
            data_dir.clone(),
            index,
            transcodes,
            probes,
            jobs_tx,
            covers,
        ));

        Self {
            root,
            data_dir,
            state,
            scanner,
            jobs_rx: Some(jobs_rx),
            _root,
            _data,
        }
    }

    pub fn engine(&self) -> Arc<dyn AudioEngine> {
        Arc::new(StubEngine)
    }

    pub fn book_dir(&self, author: &str, title: &str) -> PathBuf {
        let dir = self.root.join(author).join(title);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Run the worker in the background on this server's queue.
    pub fn spawn_worker(&mut self) {
        let rx = self.jobs_rx.take().expect("worker already spawned");
        tokio::spawn(shelfcast_server::jobs::run_worker(
            self.state.clone(),
            self.engine(),
            rx,
        ));
    }
}

/// Poll until `predicate` returns true or the timeout elapses.
pub async fn wait_until<F, Fut>(mut predicate: F, timeout: Duration)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
