//! Whole-document JSON persistence.
//!
//! Each persisted artifact (library index, transcode state, probe cache) is
//! a single JSON document written in full. Writes land in a temporary file
//! in the same directory and are renamed into place, so a crash mid-write
//! never leaves a truncated document behind.

use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Serialize `value` to `path` atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CoreError::persist(path.display().to_string(), "path has no parent"))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| CoreError::persist(path.display().to_string(), e.to_string()))?;
    Ok(())
}

/// Load a JSON document, treating a missing or unreadable file as empty.
///
/// Unreadable state is logged and discarded rather than aborting startup;
/// the scanner re-derives it.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read persisted state, starting empty");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse persisted state, starting empty");
            T::default()
        }
    }
}
