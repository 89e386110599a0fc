//! Filesystem watching with debounced rescans.
//!
//! One recursive watcher per library root. Events coalesce behind a 500 ms
//! debounce window, and at most one rescan request is outstanding at a
//! time: while a rescan is pending or running, further events are
//! swallowed. The watcher never mutates state itself; it only pokes the
//! scanner. Watcher errors are logged and non-fatal.

use crate::scanner::Scanner;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Coalescing delay for filesystem events.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Keeps the per-root debouncers alive; dropping this stops watching.
pub struct LibraryWatcher {
    debouncers: Vec<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl LibraryWatcher {
    pub fn watched_roots(&self) -> usize {
        self.debouncers.len()
    }
}

/// Subscribe to change notifications for each root and run rescans as they
/// arrive. Returns the watcher handle; the rescan loop runs on its own
/// task until the trigger channel closes.
pub fn spawn_watchers(roots: &[PathBuf], scanner: Arc<Scanner>) -> LibraryWatcher {
    // Capacity 1 + try_send is the "single outstanding rescan" rule: an
    // event arriving while one is queued is dropped on the floor.
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

    let mut debouncers = Vec::new();
    for root in roots {
        let tx = trigger_tx.clone();
        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    if !events.is_empty() {
                        let _ = tx.try_send(());
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!(error = %e, "watch error");
                    }
                }
            }
        });
        let mut debouncer = match debouncer {
            Ok(debouncer) => debouncer,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "failed to create watcher");
                continue;
            }
        };
        if let Err(e) = debouncer.watch(root, RecursiveMode::Recursive) {
            warn!(root = %root.display(), error = %e, "failed to watch root");
            continue;
        }
        info!(root = %root.display(), "watching for changes");
        debouncers.push(debouncer);
    }

    tokio::spawn(async move {
        while trigger_rx.recv().await.is_some() {
            debug!("filesystem change detected, rescanning");
            scanner.scan().await;
        }
    });

    LibraryWatcher { debouncers }
}
