/// Library discovery error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error(transparent)]
    Core(#[from] shelfcast_core::CoreError),

    #[error(transparent)]
    Media(#[from] shelfcast_media::MediaError),
}
