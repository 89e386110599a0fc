//! The library index: every book that is ready to stream.
//!
//! Keyed by book id. The scanner replaces the contents at the end of each
//! scan; the transcode worker inserts single books as their outputs finish.
//! Persisted as `library-index.json`, an array of book records ordered by
//! id. `added_at` is intentionally absent from disk and recomputed from
//! filesystem times on the next scan.

use crate::error::Result;
use crate::persist::{atomic_write_json, load_json_or_default};
use crate::types::Book;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct LibraryIndex {
    path: PathBuf,
    books: HashMap<String, Book>,
}

impl LibraryIndex {
    /// Load the persisted index, or start empty when the file is missing or
    /// unreadable.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("library-index.json");
        let records: Vec<Book> = load_json_or_default(&path);
        let books: HashMap<String, Book> =
            records.into_iter().map(|b| (b.id.clone(), b)).collect();
        if !books.is_empty() {
            info!(count = books.len(), "loaded library index");
        }
        Self { path, books }
    }

    pub fn find(&self, id: &str) -> Option<&Book> {
        self.books.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.books.contains_key(id)
    }

    /// Insert or overwrite one book (used by the worker on promotion).
    pub fn insert(&mut self, book: Book) {
        debug!(id = %book.id, kind = book.kind_str(), "index insert");
        self.books.insert(book.id.clone(), book);
    }

    /// Replace the whole index with the result of a completed scan.
    ///
    /// Books a rescan no longer produces are thereby evicted, which covers
    /// both deleted sources and singles whose container mtime changed (those
    /// drop back to pending until the worker finishes again).
    pub fn replace(&mut self, books: Vec<Book>) {
        self.books = books.into_iter().map(|b| (b.id.clone(), b)).collect();
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Ready books, newest first (`added_at` descending, `published_at` as
    /// the fallback key, undated books last).
    pub fn books_sorted(&self) -> Vec<Book> {
        let mut books: Vec<Book> = self
            .books
            .values()
            .filter(|b| b.is_streamable())
            .cloned()
            .collect();
        books.sort_by(|a, b| {
            b.feed_sort_key()
                .cmp(&a.feed_sort_key())
                .then_with(|| a.id.cmp(&b.id))
        });
        books
    }

    /// Write `library-index.json`.
    pub fn persist(&self) -> Result<()> {
        let mut records: Vec<&Book> = self.books.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        atomic_write_json(&self.path, &records)
    }
}
