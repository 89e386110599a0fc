/// The transcode worker.
///
/// Exactly one per process: the engine is CPU-heavy and progress reporting
/// assumes a single active job. Runs forever consuming the job queue,
/// concurrently with scanning and serving.
use crate::state::AppState;
use chrono::Utc;
use shelfcast_core::{Book, BookMeta, JobReceiver, PartInput, TranscodeJob, TranscodeState};
use shelfcast_media::AudioEngine;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Persist progress samples at most this often.
const PERSIST_EVERY: Duration = Duration::from_secs(2);
/// Log progress only after this much output time exists.
const LOG_AFTER_OUT_MS: u64 = 5_000;
/// And no more often than this.
const LOG_EVERY: Duration = Duration::from_millis(1_500);

pub async fn run_worker(state: AppState, engine: Arc<dyn AudioEngine>, mut jobs: JobReceiver) {
    info!("transcode worker started");
    while let Some(job) = jobs.recv().await {
        process_job(&state, engine.as_ref(), job).await;
    }
    info!("transcode worker stopped");
}

async fn process_job(state: &AppState, engine: &dyn AudioEngine, job: TranscodeJob) {
    let source = job.source.clone();

    // A record whose mtime no longer matches belongs to an older copy of
    // the source; the scan that observed the change owns its future.
    {
        let mut transcodes = state.transcodes.lock().await;
        let current = transcodes
            .get(&source)
            .map(|r| r.mtime_ms == job.mtime_ms)
            .unwrap_or(false);
        if !current {
            debug!(source = %source.display(), "dropping stale transcode job");
            transcodes.unmark_queued(&source);
            return;
        }
        transcodes.update(&source, |record| {
            record.state = TranscodeState::Working;
            record.error = None;
            if record.duration_ms.is_none() {
                record.duration_ms = job.meta.duration_seconds.map(|s| (s * 1000.0) as u64);
            }
        });
        if let Err(e) = transcodes.persist() {
            warn!(error = %e, "failed to persist transcode state");
        }
    }

    info!(source = %source.display(), target = %job.target.display(), "transcode started");
    let started = Instant::now();

    // Progress flows through a channel so persistence can be throttled
    // without blocking the engine's read loop.
    let (progress_tx, progress_rx) = mpsc::unbounded_channel::<(Option<u64>, Option<f64>)>();
    let monitor = tokio::spawn(monitor_progress(
        state.clone(),
        source.clone(),
        progress_rx,
    ));

    let on_progress = move |out_time_ms: Option<u64>, speed: Option<f64>| {
        let _ = progress_tx.send((out_time_ms, speed));
    };
    let cover = job.meta.cover_path.as_deref();
    let result = engine
        .convert(&source, &job.target, cover, &on_progress)
        .await;
    drop(on_progress);
    let _ = monitor.await;

    let result = result.and_then(|()| finish_output(&job));
    match result {
        Ok(out_size) => {
            // Terminal state is persisted before the index promotion so a
            // crash in between re-derives the book from the done record.
            {
                let mut transcodes = state.transcodes.lock().await;
                transcodes.update(&source, |record| {
                    record.state = TranscodeState::Done;
                    record.error = None;
                });
                transcodes.unmark_queued(&source);
                if let Err(e) = transcodes.persist() {
                    warn!(error = %e, "failed to persist transcode state");
                }
            }

            let book = book_from_meta(&job.meta, &job.target, out_size);
            {
                let mut index = state.index.write().await;
                index.insert(book);
                if let Err(e) = index.persist() {
                    warn!(error = %e, "failed to persist library index");
                }
            }
            info!(
                source = %source.display(),
                out_size,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "transcode finished"
            );
        }
        Err(e) => {
            warn!(source = %source.display(), error = %e, "transcode failed");
            let mut transcodes = state.transcodes.lock().await;
            transcodes.update(&source, |record| {
                record.state = TranscodeState::Failed;
                record.error = Some(e.to_string());
            });
            transcodes.unmark_queued(&source);
            if let Err(e) = transcodes.persist() {
                warn!(error = %e, "failed to persist transcode state");
            }
        }
    }
}

/// Stamp the output's mtime to the source's and stat it.
///
/// The `(source, mtime)` identity check must keep holding after the output
/// round-trips through the filesystem, so the output carries the source's
/// timestamp.
fn finish_output(job: &TranscodeJob) -> Result<u64, shelfcast_media::MediaError> {
    let stamp = mtime_to_system_time(job.mtime_ms);
    let file = std::fs::File::options().write(true).open(&job.target)?;
    file.set_modified(stamp)?;

    let size = std::fs::metadata(&job.target)?.len();
    if size == 0 {
        return Err(shelfcast_media::MediaError::engine(
            "ffmpeg",
            "converter produced an empty output file",
        ));
    }
    Ok(size)
}

fn mtime_to_system_time(mtime_ms: i64) -> SystemTime {
    if mtime_ms >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_millis(mtime_ms as u64)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_millis(mtime_ms.unsigned_abs())
    }
}

async fn monitor_progress(
    state: AppState,
    source: std::path::PathBuf,
    mut rx: mpsc::UnboundedReceiver<(Option<u64>, Option<f64>)>,
) {
    let mut last_persist = Instant::now();
    let mut last_log: Option<Instant> = None;

    while let Some((out_time_ms, speed)) = rx.recv().await {
        let mut transcodes = state.transcodes.lock().await;
        transcodes.update(&source, |record| {
            if out_time_ms.is_some() {
                record.out_time_ms = out_time_ms;
            }
            if speed.is_some() {
                record.speed = speed;
            }
        });
        if last_persist.elapsed() >= PERSIST_EVERY {
            if let Err(e) = transcodes.persist() {
                warn!(error = %e, "failed to persist transcode progress");
            }
            last_persist = Instant::now();
        }
        drop(transcodes);

        if let Some(out) = out_time_ms {
            let due = last_log
                .map(|at| at.elapsed() >= LOG_EVERY)
                .unwrap_or(true);
            if out >= LOG_AFTER_OUT_MS && due {
                info!(
                    source = %source.display(),
                    out_time_ms = out,
                    speed = speed.unwrap_or_default(),
                    "transcode progress"
                );
                last_log = Some(Instant::now());
            }
        }
    }
}

/// Rebuild the streamable book from the meta snapshot and the output stat.
fn book_from_meta(meta: &BookMeta, target: &Path, size: u64) -> Book {
    let mut book = Book::single(
        &meta.id,
        &meta.title,
        &meta.author,
        PartInput {
            path: target.to_path_buf(),
            name: target
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            duration_ms: meta
                .duration_seconds
                .map(|s| (s * 1000.0).round() as u64)
                .unwrap_or_default(),
            title: None,
        },
        meta.chapters.clone(),
    );
    book.cover_path = meta.cover_path.clone();
    book.epub_path = meta.epub_path.clone();
    book.published_at = meta.published_at;
    book.added_at = Some(Utc::now());
    book.description = meta.description.clone();
    book.description_html = meta.description_html.clone();
    book.language = meta.language.clone();
    book.isbn = meta.isbn.clone();
    book.identifiers = meta.identifiers.clone();
    book
}
