/// Shared application state
use crate::config::ServerConfig;
use shelfcast_core::{Book, BookMeta, JobSender, LibraryIndex, TranscodeState, TranscodeStore};
use shelfcast_media::ProbeCache;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One feed entry: either streamable now, or a single container still
/// being normalized (shown so operators see it coming).
#[derive(Debug, Clone)]
pub enum FeedBook {
    Ready(Book),
    Pending(BookMeta),
}

/// Application state shared across all handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub roots: Arc<Vec<PathBuf>>,
    pub index: Arc<RwLock<LibraryIndex>>,
    pub transcodes: Arc<Mutex<TranscodeStore>>,
    pub probes: Arc<Mutex<ProbeCache>>,
    pub jobs: JobSender,
    pub api_key: String,
}

impl AppState {
    /// Ready books, newest first.
    pub async fn books_sorted(&self) -> Vec<Book> {
        self.index.read().await.books_sorted()
    }

    pub async fn find_book(&self, id: &str) -> Option<Book> {
        self.index.read().await.find(id).cloned()
    }

    /// The operator-visible superset: ready books plus in-flight singles
    /// whose ids are not indexed yet.
    pub async fn feed_books_sorted(&self) -> Vec<FeedBook> {
        let ready = self.books_sorted().await;
        let mut entries: Vec<FeedBook> = ready.iter().cloned().map(FeedBook::Ready).collect();

        let transcodes = self.transcodes.lock().await;
        let mut pending: Vec<BookMeta> = transcodes
            .records()
            .filter(|r| {
                matches!(
                    r.state,
                    TranscodeState::Pending | TranscodeState::Working
                )
            })
            .filter_map(|r| r.meta.clone())
            .filter(|meta| !ready.iter().any(|b| b.id == meta.id))
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        entries.extend(pending.into_iter().map(FeedBook::Pending));
        entries
    }
}
