//! Filesystem metadata helpers.
//!
//! Modification times are the identity component for probe and transcode
//! records, so everything reads them through one place, as epoch
//! milliseconds.

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

fn system_time_ms(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Modification time of `path` as epoch milliseconds.
pub fn mtime_ms(path: &Path) -> Option<i64> {
    let meta = std::fs::metadata(path).ok()?;
    mtime_ms_of(&meta)
}

pub fn mtime_ms_of(meta: &Metadata) -> Option<i64> {
    meta.modified().ok().map(system_time_ms)
}

/// Best-effort "when did this appear": birth time, else mtime, else now.
pub fn added_at(path: &Path) -> DateTime<Utc> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(_) => return Utc::now(),
    };
    meta.created()
        .or_else(|_| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// Modification time as a UTC timestamp.
pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtime_of_fresh_file_is_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();

        let ms = mtime_ms(&path).unwrap();
        let now = system_time_ms(SystemTime::now());
        assert!((now - ms).abs() < 60_000);
    }

    #[test]
    fn missing_file_has_no_mtime() {
        assert_eq!(mtime_ms(Path::new("/no/such/file")), None);
    }
}
