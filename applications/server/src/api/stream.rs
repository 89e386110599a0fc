/// Audio streaming API
///
/// Serves byte ranges against the virtual object `tag ‖ audio`: the
/// synthesized chapter tag (multi books only) followed by the container or
/// the concatenation of parts. Bodies are streamed chunk-by-chunk; nothing
/// here materializes a whole book in memory.
use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use shelfcast_core::Book;
use shelfcast_media::{assembly, chapter_tag, CoverArt};

/// GET /books/:id/stream
pub async fn stream_book(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let book = state
        .find_book(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("book {id}")))?;

    let tag = build_tag(&book).await;
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let response = match assembly::plan(&book, &tag, range) {
        assembly::StreamPlan::Whole { total_size, body } => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, book.mime.as_str())
            .header(header::CONTENT_LENGTH, total_size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(assembly::stream_body(body))),
        assembly::StreamPlan::Partial {
            start,
            end,
            total_size,
            body,
        } => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, book.mime.as_str())
            .header(header::CONTENT_LENGTH, end - start + 1)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{total_size}"),
            )
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(assembly::stream_body(body))),
        assembly::StreamPlan::Unsatisfiable { total_size } => Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{total_size}"))
            .body(Body::empty()),
    };

    response.map_err(|e| ServerError::Internal(format!("failed to build response: {e}")))
}

/// The tag prefix for a book: the encoded chapter index plus cover art for
/// multi books, empty for singles.
pub async fn build_tag(book: &Book) -> Vec<u8> {
    if !book.is_multi() {
        return Vec::new();
    }
    let chapters = book.chapters().unwrap_or_default();
    let cover = load_cover(book).await;
    chapter_tag::encode(chapters, cover.as_ref())
}

/// Predicted tag length, used by the feed so the advertised enclosure size
/// matches what the stream endpoint will deliver.
pub async fn estimated_tag_len(book: &Book) -> u64 {
    if !book.is_multi() {
        return 0;
    }
    let chapters = book.chapters().unwrap_or_default();
    let cover = match &book.cover_path {
        Some(path) => tokio::fs::metadata(path)
            .await
            .ok()
            .filter(|meta| meta.len() > 0)
            .map(|meta| (cover_mime(book).len() as u64, meta.len())),
        None => None,
    };
    chapter_tag::encoded_len(chapters, cover)
}

async fn load_cover(book: &Book) -> Option<CoverArt> {
    let path = book.cover_path.as_ref()?;
    let data = tokio::fs::read(path).await.ok()?;
    if data.is_empty() {
        return None;
    }
    Some(CoverArt {
        mime: cover_mime(book).to_string(),
        data,
    })
}

fn cover_mime(book: &Book) -> &'static str {
    match book
        .cover_path
        .as_ref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}
