/// Core error types for Shelfcast
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Persisting a document to disk failed
    #[error("Persist error for {path}: {message}")]
    Persist { path: String, message: String },

    /// A book could not be assembled from its on-disk parts
    #[error("Invalid book {id}: {message}")]
    InvalidBook { id: String, message: String },
}

impl CoreError {
    pub fn persist(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persist {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_book(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBook {
            id: id.into(),
            message: message.into(),
        }
    }
}
