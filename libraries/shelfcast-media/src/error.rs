/// Media pipeline error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaError>;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The external tool exited non-zero or produced no usable output.
    #[error("{tool} failed: {message}")]
    Engine { tool: String, message: String },

    /// The external tool's output could not be interpreted.
    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error(transparent)]
    Core(#[from] shelfcast_core::CoreError),
}

impl MediaError {
    pub fn engine(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
