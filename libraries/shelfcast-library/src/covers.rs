//! Cover resolution.
//!
//! Resolution order: embedded art from the first `.m4b`, else from the
//! first `.mp3`, else an image pulled out of an `.epub` (entries named
//! "cover" preferred), else the first raw `.png`, else the first raw
//! `.jpg`/`.jpeg`. Extracted images are cached in the data directory under
//! `cover-<slug>-<mtime36>.<ext>` so repeat scans reuse them.

use crate::layout::BookFolder;
use shelfcast_core::{base36_ms, fsmeta};
use shelfcast_media::AudioEngine;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub struct CoverResolver {
    data_dir: PathBuf,
    engine: Arc<dyn AudioEngine>,
}

impl CoverResolver {
    pub fn new(data_dir: PathBuf, engine: Arc<dyn AudioEngine>) -> Self {
        Self { data_dir, engine }
    }

    pub async fn resolve(&self, folder: &BookFolder, slug: &str) -> Option<PathBuf> {
        if let Some(container) = folder.containers.first() {
            if let Some(path) = self.embedded(container, slug).await {
                return Some(path);
            }
        }
        if let Some(part) = folder.parts.first() {
            if let Some(path) = self.embedded(part, slug).await {
                return Some(path);
            }
        }
        if let Some(epub) = folder.epubs.first() {
            if let Some(path) = self.from_epub(epub, slug) {
                return Some(path);
            }
        }
        folder
            .png_covers
            .first()
            .or_else(|| folder.jpg_covers.first())
            .cloned()
    }

    /// Extract embedded art via the engine, cached by source mtime.
    async fn embedded(&self, source: &Path, slug: &str) -> Option<PathBuf> {
        let mtime = fsmeta::mtime_ms(source)?;
        let cache = self
            .data_dir
            .join(format!("cover-{slug}-{}.jpg", base36_ms(mtime)));
        if cached_nonempty(&cache) {
            return Some(cache);
        }
        match self.engine.extract_cover(source, &cache).await {
            Ok(()) => Some(cache),
            Err(e) => {
                debug!(source = %source.display(), error = %e, "no embedded cover");
                let _ = std::fs::remove_file(&cache);
                None
            }
        }
    }

    /// Pull an image entry out of the EPUB zip container.
    fn from_epub(&self, epub: &Path, slug: &str) -> Option<PathBuf> {
        let mtime = fsmeta::mtime_ms(epub)?;

        let file = std::fs::File::open(epub).ok()?;
        let mut archive = zip::ZipArchive::new(file).ok()?;

        let mut candidates: Vec<(usize, String)> = Vec::new();
        for i in 0..archive.len() {
            let Ok(entry) = archive.by_index(i) else {
                continue;
            };
            let name = entry.name().to_lowercase();
            if IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{ext}"))) {
                candidates.push((i, name));
            }
        }
        // Entries that call themselves "cover" win over incidental images.
        candidates.sort_by_key(|(i, name)| (!name.contains("cover"), *i));
        let (index, name) = candidates.into_iter().next()?;

        let ext = if name.ends_with(".png") { "png" } else { "jpg" };
        let cache = self
            .data_dir
            .join(format!("cover-{slug}-{}.{ext}", base36_ms(mtime)));
        if cached_nonempty(&cache) {
            return Some(cache);
        }

        let mut entry = archive.by_index(index).ok()?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).ok()?;
        if bytes.is_empty() {
            return None;
        }
        if let Err(e) = std::fs::write(&cache, &bytes) {
            debug!(epub = %epub.display(), error = %e, "failed to cache epub cover");
            return None;
        }
        Some(cache)
    }
}

fn cached_nonempty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}
