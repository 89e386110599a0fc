/// Library listing API
use crate::error::{Result, ServerError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use shelfcast_core::Book;

/// GET /books — ready books, newest first.
pub async fn list_books(State(state): State<AppState>) -> Json<Vec<Book>> {
    Json(state.books_sorted().await)
}

/// GET /books/:id
pub async fn get_book(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Book>> {
    let book = state
        .find_book(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("book {id}")))?;
    Ok(Json(book))
}
