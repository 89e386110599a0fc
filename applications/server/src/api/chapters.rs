/// Chapters API: Podcast Namespace chapters JSON.
use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

/// GET /books/:id/chapters
///
/// Multi books always have a chapter table; singles only when the probe
/// found embedded chapters. Without one this is a 404.
pub async fn book_chapters(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let book = state
        .find_book(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("book {id}")))?;

    let chapters = book
        .chapters()
        .filter(|chapters| !chapters.is_empty())
        .ok_or_else(|| ServerError::NotFound(format!("book {id} has no chapters")))?;

    let entries: Vec<Value> = chapters
        .iter()
        .map(|ch| {
            json!({
                "startTime": ch.start_ms as f64 / 1000.0,
                "title": ch.title,
            })
        })
        .collect();

    Ok(Json(json!({
        "version": "1.2.0",
        "chapters": entries,
    })))
}
