//! Shelfcast server: HTTP surface, transcode worker, and process wiring.

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;
