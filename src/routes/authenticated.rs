use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes that need a caller identity. The `AuthUser` middleware layered on this router
/// rejects anonymous requests with 401 before they reach the handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /items/{id}/copy
        // Copies a public item into the caller's space (or under a folder they can write).
        .route("/items/{id}/copy", post(handlers::copy_item))
}
