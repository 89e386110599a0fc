//! The library scanner.
//!
//! Walks `<root>/<author>/<title>/` directories, classifies each title
//! directory, resolves display metadata, and produces the set of ready
//! books plus the transcode jobs still needed. Idempotent over an
//! unchanged filesystem; unreadable directories are logged and skipped,
//! never fatal.

use crate::covers::CoverResolver;
use crate::layout::{BookFolder, BookShape};
use crate::opf::{self, OpfMetadata};
use chrono::{DateTime, NaiveDate, Utc};
use shelfcast_core::{
    base36_ms, fsmeta, slugify, Book, BookMeta, ChapterTiming, JobSender, LibraryIndex, PartInput,
    ProbeData, TranscodeJob, TranscodeState, TranscodeStatus, TranscodeStore,
};
use shelfcast_media::ProbeCache;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Books ready to stream after this scan.
    pub ready: usize,
    /// Single containers waiting on (or already queued for) normalization.
    pub pending: usize,
    /// Books hidden because a part or container is unusable.
    pub failed: usize,
    /// Transcode jobs enqueued by this scan.
    pub enqueued: usize,
    /// Directories skipped on I/O errors.
    pub errors: usize,
}

#[derive(Default)]
struct ScanContext {
    ready: Vec<Book>,
    seen_ids: HashSet<String>,
    seen_sources: HashSet<PathBuf>,
    summary: ScanSummary,
}

pub struct Scanner {
    roots: Vec<PathBuf>,
    data_dir: PathBuf,
    index: Arc<RwLock<LibraryIndex>>,
    transcodes: Arc<Mutex<TranscodeStore>>,
    probes: Arc<Mutex<ProbeCache>>,
    jobs: JobSender,
    covers: CoverResolver,
    /// Rescans are strictly serialized; a rescan requested mid-scan waits.
    scan_lock: Mutex<()>,
}

impl Scanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        roots: Vec<PathBuf>,
        data_dir: PathBuf,
        index: Arc<RwLock<LibraryIndex>>,
        transcodes: Arc<Mutex<TranscodeStore>>,
        probes: Arc<Mutex<ProbeCache>>,
        jobs: JobSender,
        covers: CoverResolver,
    ) -> Self {
        Self {
            roots,
            data_dir,
            index,
            transcodes,
            probes,
            jobs,
            covers,
            scan_lock: Mutex::new(()),
        }
    }

    /// Run one full scan over every configured root.
    pub async fn scan(&self) -> ScanSummary {
        let _guard = self.scan_lock.lock().await;
        let started = std::time::Instant::now();
        info!(roots = self.roots.len(), "library scan started");

        let mut ctx = ScanContext::default();

        for root in &self.roots {
            let author_dirs = match sorted_subdirs(root) {
                Ok(dirs) => dirs,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "unreadable root, skipping");
                    ctx.summary.errors += 1;
                    continue;
                }
            };
            for author_dir in author_dirs {
                let author = dir_name(&author_dir);
                let title_dirs = match sorted_subdirs(&author_dir) {
                    Ok(dirs) => dirs,
                    Err(e) => {
                        warn!(dir = %author_dir.display(), error = %e, "unreadable author directory, skipping");
                        ctx.summary.errors += 1;
                        continue;
                    }
                };
                for title_dir in title_dirs {
                    if let Err(e) = self.scan_title(&author, &title_dir, &mut ctx).await {
                        warn!(dir = %title_dir.display(), error = %e, "failed to scan book directory");
                        ctx.summary.errors += 1;
                    }
                }
            }
        }

        {
            let mut transcodes = self.transcodes.lock().await;
            transcodes.retain_sources(&ctx.seen_sources);
            if let Err(e) = transcodes.persist() {
                warn!(error = %e, "failed to persist transcode state");
            }
        }
        {
            let mut index = self.index.write().await;
            index.replace(ctx.ready);
            if let Err(e) = index.persist() {
                warn!(error = %e, "failed to persist library index");
            }
        }

        let summary = ctx.summary;
        info!(
            ready = summary.ready,
            pending = summary.pending,
            failed = summary.failed,
            enqueued = summary.enqueued,
            errors = summary.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "library scan finished"
        );
        summary
    }

    async fn scan_title(
        &self,
        author: &str,
        dir: &Path,
        ctx: &mut ScanContext,
    ) -> crate::error::Result<()> {
        let folder = BookFolder::read(dir)?;
        let Some(shape) = folder.shape() else {
            debug!(dir = %dir.display(), "no audio files, skipping");
            return Ok(());
        };

        // The folder name, not the resolved display title, keeps the id
        // stable against tag edits.
        let id = slugify(&format!("{author}-{}", folder.folder_name));
        if !ctx.seen_ids.insert(id.clone()) {
            warn!(id = %id, dir = %dir.display(), "duplicate book id, later directory wins");
        }

        match shape {
            BookShape::Multi(parts) => {
                let parts = parts.to_vec();
                self.build_multi(author, &folder, id, &parts, ctx).await;
            }
            BookShape::Single(container) => {
                let container = container.to_path_buf();
                self.build_single(author, &folder, id, &container, ctx).await;
            }
        }
        Ok(())
    }

    async fn build_multi(
        &self,
        author: &str,
        folder: &BookFolder,
        id: String,
        parts: &[PathBuf],
        ctx: &mut ScanContext,
    ) {
        let mut inputs = Vec::with_capacity(parts.len());
        for part in parts {
            ctx.seen_sources.insert(part.clone());

            let (size, mtime) = match stat(part) {
                Some(pair) => pair,
                None => {
                    self.fail_source(part, 0, "part file vanished during scan").await;
                    ctx.summary.failed += 1;
                    return;
                }
            };
            let data = self.probe(part, mtime).await;
            let duration = data.as_ref().and_then(|d| d.duration);

            if size == 0 || duration.is_none() {
                let error = if size == 0 {
                    format!("part {} is empty", part.display())
                } else {
                    format!("probe returned no duration for {}", part.display())
                };
                self.fail_source(part, mtime, &error).await;
                ctx.summary.failed += 1;
                return;
            }
            // A good part clears any stale failure left from an older copy.
            {
                let mut transcodes = self.transcodes.lock().await;
                let stale = transcodes
                    .get(part)
                    .map(|r| r.mtime_ms != mtime)
                    .unwrap_or(false);
                if stale {
                    transcodes.remove(part);
                }
            }

            inputs.push(PartInput {
                path: part.clone(),
                name: file_stem(part),
                size,
                duration_ms: (duration.unwrap_or_default() * 1000.0).round() as u64,
                title: data
                    .as_ref()
                    .and_then(|d| d.tags.present("title"))
                    .map(str::to_string),
            });
        }

        let meta_source = &parts[0];
        let mtime = fsmeta::mtime_ms(meta_source).unwrap_or_default();
        let probe = self.probe(meta_source, mtime).await;
        let resolved = self
            .resolve_metadata(author, folder, &id, probe.as_ref())
            .await;

        let mut book = match Book::multi(&id, &resolved.title, &resolved.author, inputs) {
            Ok(book) => book,
            Err(e) => {
                warn!(id = %id, error = %e, "failed to assemble multi book");
                ctx.summary.failed += 1;
                return;
            }
        };
        resolved.apply(&mut book, meta_source);
        ctx.summary.ready += 1;
        ctx.ready.push(book);
    }

    async fn build_single(
        &self,
        author: &str,
        folder: &BookFolder,
        id: String,
        container: &Path,
        ctx: &mut ScanContext,
    ) {
        ctx.seen_sources.insert(container.to_path_buf());

        let Some((_, mtime)) = stat(container) else {
            self.fail_source(container, 0, "container vanished during scan").await;
            ctx.summary.failed += 1;
            return;
        };

        let probe = self.probe(container, mtime).await;
        let duration = probe.as_ref().and_then(|d| d.duration);
        let target = self
            .data_dir
            .join(format!("{id}-{}.mp3", base36_ms(mtime)));

        let Some(duration) = duration else {
            let error = format!("probe returned no duration for {}", container.display());
            let mut transcodes = self.transcodes.lock().await;
            transcodes.upsert(TranscodeStatus::failed(
                container.to_path_buf(),
                target,
                mtime,
                error,
            ));
            ctx.summary.failed += 1;
            return;
        };

        let chapters = self.chapters(container, mtime).await;
        let resolved = self
            .resolve_metadata(author, folder, &id, probe.as_ref())
            .await;

        // A finished transcode whose identity still matches is reused
        // directly; no re-enqueue.
        {
            let transcodes = self.transcodes.lock().await;
            if let Some(record) = transcodes.get_current(container, mtime) {
                if record.state == TranscodeState::Done {
                    if let Some((out_size, _)) = stat(&record.target) {
                        if out_size > 0 {
                            let mut book = Book::single(
                                &id,
                                &resolved.title,
                                &resolved.author,
                                PartInput {
                                    path: record.target.clone(),
                                    name: file_stem(&record.target),
                                    size: out_size,
                                    duration_ms: (duration * 1000.0).round() as u64,
                                    title: None,
                                },
                                chapters.clone(),
                            );
                            resolved.apply(&mut book, container);
                            ctx.summary.ready += 1;
                            ctx.ready.push(book);
                            return;
                        }
                    }
                    debug!(source = %container.display(), "done record but output missing, re-enqueueing");
                }
            }
        }

        let meta = BookMeta {
            id: id.clone(),
            title: resolved.title.clone(),
            author: resolved.author.clone(),
            cover_path: resolved.cover_path.clone(),
            epub_path: resolved.epub_path.clone(),
            duration_seconds: Some(duration),
            published_at: resolved.published_at(container),
            description: resolved.description.clone(),
            description_html: resolved.description_html.clone(),
            language: resolved.language.clone(),
            isbn: resolved.isbn.clone(),
            identifiers: resolved.identifiers.clone(),
            chapters,
        };

        let mut transcodes = self.transcodes.lock().await;
        let current = transcodes.get_current(container, mtime);
        let working = current
            .map(|r| r.state == TranscodeState::Working)
            .unwrap_or(false);
        if !working {
            // Preserve an earlier error only while the source is unchanged.
            let prior_error = current.and_then(|r| r.error.clone());
            let mut status = TranscodeStatus::pending(
                container.to_path_buf(),
                target.clone(),
                mtime,
                meta.clone(),
            );
            status.error = prior_error;
            transcodes.upsert(status);
        }
        if !transcodes.is_queued(container) {
            transcodes.mark_queued(container);
            self.jobs.push(TranscodeJob {
                source: container.to_path_buf(),
                target,
                mtime_ms: mtime,
                meta,
            });
            ctx.summary.enqueued += 1;
        }
        ctx.summary.pending += 1;
    }

    async fn resolve_metadata(
        &self,
        author_folder: &str,
        folder: &BookFolder,
        id: &str,
        probe: Option<&ProbeData>,
    ) -> ResolvedMetadata {
        let opf = folder.opf.as_deref().and_then(opf::parse_opf);
        let tags = probe.map(|d| d.tags.clone()).unwrap_or_default();

        let title = opf
            .as_ref()
            .and_then(|o| o.title.clone())
            .unwrap_or_else(|| folder.folder_name.clone());

        let author = tags
            .first_present(&["artist", "album_artist"])
            .map(str::to_string)
            .or_else(|| opf.as_ref().and_then(|o| o.creator.clone()))
            .unwrap_or_else(|| author_folder.to_string());

        // Keep the longer of the two descriptions; the OPF one brings its
        // HTML form along when it wins.
        let audio_description = tags.present("description").map(str::to_string);
        let opf_description = opf.as_ref().and_then(|o| o.description.clone());
        let (description, description_html) = match (&opf_description, &audio_description) {
            (Some(from_opf), Some(from_audio)) if from_audio.len() > from_opf.len() => {
                (Some(from_audio.clone()), None)
            }
            (Some(from_opf), _) => (
                Some(from_opf.clone()),
                opf.as_ref().and_then(|o| o.description_html.clone()),
            ),
            (None, from_audio) => (from_audio.clone(), None),
        };

        let language = tags
            .present("language")
            .map(str::to_string)
            .or_else(|| opf.as_ref().and_then(|o| o.language.clone()));

        let opf_date = opf.as_ref().and_then(|o| o.date.clone());
        let audio_date = tags.present("date").map(str::to_string);

        let cover_path = self.covers.resolve(folder, id).await;
        let epub_path = folder.epubs.first().cloned();

        ResolvedMetadata {
            title,
            author,
            description,
            description_html,
            language,
            isbn: opf.as_ref().and_then(|o| o.isbn().map(str::to_string)),
            identifiers: opf
                .as_ref()
                .map(|o| o.identifiers.clone())
                .unwrap_or_default(),
            opf_date,
            audio_date,
            cover_path,
            epub_path,
            added_at: fsmeta::added_at(&folder.dir),
        }
    }

    async fn probe(&self, path: &Path, mtime: i64) -> Option<ProbeData> {
        self.probes.lock().await.probe(path, mtime).await
    }

    async fn chapters(&self, path: &Path, mtime: i64) -> Option<Vec<ChapterTiming>> {
        self.probes.lock().await.chapters(path, mtime).await
    }

    async fn fail_source(&self, source: &Path, mtime: i64, error: &str) {
        warn!(source = %source.display(), error, "book hidden from feed");
        let mut transcodes = self.transcodes.lock().await;
        transcodes.upsert(TranscodeStatus::failed(
            source.to_path_buf(),
            source.to_path_buf(),
            mtime,
            error,
        ));
    }
}

/// Display metadata resolved from tags, OPF, and folder names.
struct ResolvedMetadata {
    title: String,
    author: String,
    description: Option<String>,
    description_html: Option<String>,
    language: Option<String>,
    isbn: Option<String>,
    identifiers: std::collections::BTreeMap<String, String>,
    opf_date: Option<String>,
    audio_date: Option<String>,
    cover_path: Option<PathBuf>,
    epub_path: Option<PathBuf>,
    added_at: DateTime<Utc>,
}

impl ResolvedMetadata {
    /// opf date, else audio date, else the source file's mtime.
    fn published_at(&self, source: &Path) -> Option<DateTime<Utc>> {
        self.opf_date
            .as_deref()
            .and_then(parse_date)
            .or_else(|| self.audio_date.as_deref().and_then(parse_date))
            .or_else(|| fsmeta::modified_at(source))
    }

    fn apply(&self, book: &mut Book, source: &Path) {
        book.cover_path = self.cover_path.clone();
        book.epub_path = self.epub_path.clone();
        book.published_at = self.published_at(source);
        book.added_at = Some(self.added_at);
        book.description = self.description.clone();
        book.description_html = self.description_html.clone();
        book.language = self.language.clone();
        book.isbn = self.isbn.clone();
        book.identifiers = self.identifiers.clone();
    }
}

/// Parse the date formats that show up in OPF documents and audio tags.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(year) = raw.parse::<i32>() {
        return NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());
    }
    None
}

fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stat(path: &Path) -> Option<(u64, i64)> {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.len(), fsmeta::mtime_ms_of(&meta)?))
}
