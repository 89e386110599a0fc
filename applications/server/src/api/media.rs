/// Cover and e-book passthrough
use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// GET /books/:id/cover
pub async fn book_cover(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let book = state
        .find_book(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("book {id}")))?;
    let path = book
        .cover_path
        .ok_or_else(|| ServerError::NotFound(format!("book {id} has no cover")))?;
    serve_file(&path).await
}

/// GET /books/:id/ebook
pub async fn book_ebook(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let book = state
        .find_book(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("book {id}")))?;
    let path = book
        .epub_path
        .ok_or_else(|| ServerError::NotFound(format!("book {id} has no ebook")))?;
    serve_file(&path).await
}

async fn serve_file(path: &std::path::Path) -> Result<Response> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ServerError::NotFound(format!("file missing: {}", path.display())))?;

    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    let file = File::open(path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(body)
        .map_err(|e| ServerError::Internal(format!("failed to build response: {e}")))
}
