/// API-key authentication middleware
///
/// A single static key protects every route except the health check. The
/// key lives in `api-key.txt` in the data directory (created on first run)
/// and is accepted either as a `?key=` query parameter — podcast clients
/// can only carry credentials in the URL — or as a bearer token.
use crate::error::ServerError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use std::path::Path;
use tracing::info;

const API_KEY_FILE: &str = "api-key.txt";
const API_KEY_BYTES: usize = 24;

/// Read the persisted API key, generating one on first run.
pub fn load_or_create_api_key(data_dir: &Path) -> std::io::Result<String> {
    let path = data_dir.join(API_KEY_FILE);
    match std::fs::read_to_string(&path) {
        Ok(key) => {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        Err(_) => {}
    }

    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let key: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    std::fs::write(&path, &key)?;
    info!(path = %path.display(), "generated api key");
    Ok(key)
}

pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let presented = query_key(request.uri().query()).or_else(|| bearer_key(&request));

    match presented {
        Some(key) if key == state.api_key => Ok(next.run(request).await),
        _ => Err(ServerError::Unauthorized("invalid or missing api key".to_string())),
    }
}

fn query_key(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("key="))
        .map(str::to_string)
}

fn bearer_key(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_api_key(dir.path()).unwrap();
        assert_eq!(first.len(), API_KEY_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let second = load_or_create_api_key(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn query_key_extraction() {
        assert_eq!(query_key(Some("key=abc")), Some("abc".to_string()));
        assert_eq!(query_key(Some("a=1&key=abc&b=2")), Some("abc".to_string()));
        assert_eq!(query_key(Some("a=1")), None);
        assert_eq!(query_key(None), None);
    }
}
