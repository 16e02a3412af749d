use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints accessible to any client. Reads only ever return items under the public tag;
/// every write attempt is answered by an edit gate.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Items ---
        .route("/items", get(handlers::get_items_by_tag))
        .route("/items/published", get(handlers::get_published_items))
        .route("/items/many", get(handlers::get_many_items))
        .route(
            "/items/{id}",
            get(handlers::get_item).patch(handlers::reject_item_update),
        )
        .route("/items/{id}/children", get(handlers::get_children))
        // Edit gates: the public surface never modifies items.
        .route("/items/upload", post(handlers::reject_item_upload))
        .route(
            "/items/thumbnails/upload",
            post(handlers::reject_thumbnail_upload),
        )
        // --- Memberships ---
        .route("/item-memberships", get(handlers::get_many_item_memberships))
        // --- Members ---
        .route("/members", get(handlers::get_many_members))
        .route(
            "/members/{id}",
            get(handlers::get_member).patch(handlers::reject_member_update),
        )
        .route("/members/avatars/upload", post(handlers::reject_avatar_upload))
}
