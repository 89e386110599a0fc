//! The transcode job queue.
//!
//! Single producer (the scanner), single consumer (the worker), unbounded.
//! The process exits to shut down, so the channel is never closed
//! explicitly; dropping the last sender ends the worker loop naturally in
//! tests.

use crate::types::BookMeta;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Source mtime at enqueue time; the worker drops the job when the
    /// stored record no longer matches.
    pub mtime_ms: i64,
    pub meta: BookMeta,
}

#[derive(Clone)]
pub struct JobSender {
    tx: mpsc::UnboundedSender<TranscodeJob>,
    depth: Arc<AtomicUsize>,
}

pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<TranscodeJob>,
    depth: Arc<AtomicUsize>,
}

pub fn job_queue() -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        JobSender {
            tx,
            depth: Arc::clone(&depth),
        },
        JobReceiver { rx, depth },
    )
}

impl JobSender {
    pub fn push(&self, job: TranscodeJob) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        // Fails only when the worker is gone, i.e. the process is exiting.
        let _ = self.tx.send(job);
    }

    /// Jobs pushed but not yet picked up by the worker.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl JobReceiver {
    pub async fn recv(&mut self) -> Option<TranscodeJob> {
        let job = self.rx.recv().await;
        if job.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(source: &str) -> TranscodeJob {
        TranscodeJob {
            source: source.into(),
            target: "/out.mp3".into(),
            mtime_ms: 1,
            meta: BookMeta::default(),
        }
    }

    #[tokio::test]
    async fn fifo_order_and_depth() {
        let (tx, mut rx) = job_queue();
        tx.push(job("/a.m4b"));
        tx.push(job("/b.m4b"));
        assert_eq!(tx.depth(), 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.source, PathBuf::from("/a.m4b"));
        assert_eq!(tx.depth(), 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.source, PathBuf::from("/b.m4b"));
        assert_eq!(tx.depth(), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_when_producers_drop() {
        let (tx, mut rx) = job_queue();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
