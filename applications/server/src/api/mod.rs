//! HTTP handlers and routing.

pub mod books;
pub mod chapters;
pub mod feed;
pub mod health;
pub mod media;
pub mod status;
pub mod stream;

use crate::middleware::api_key_middleware;
use crate::state::AppState;
use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Everything except the health check sits behind the API key.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health));

    let protected_routes = Router::new()
        .route("/feed", get(feed::feed))
        .route("/books", get(books::list_books))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/stream", get(stream::stream_book))
        .route("/books/:id/chapters", get(chapters::book_chapters))
        .route("/books/:id/cover", get(media::book_cover))
        .route("/books/:id/ebook", get(media::book_ebook))
        .route("/status", get(status::status))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
