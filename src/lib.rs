use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Tree and tag model.
pub mod path;
pub mod tags;
pub mod visibility;

// Operations over one storage snapshot.
pub mod copy;
pub mod fetch;
pub mod memberships;
pub mod pipeline;
pub mod service;

// Storage.
pub mod memory;
pub mod repository;

// HTTP surface.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{PublicError, PublicResult};
pub use memory::{MemoryData, MemoryRepository};
pub use repository::{PostgresRepository, RepositoryState};
pub use service::PublicItemService;
pub use visibility::Visibility;

/// ApiDoc
///
/// OpenAPI document of the public surface. Aggregates every handler carrying
/// `#[utoipa::path]` and every schema used in a request or response body, including the
/// error body returned by failed requests and failed batch elements.
/// The resulting JSON is served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    // Every handler of the public and authenticated routers.
    paths(
        handlers::get_item, handlers::get_children, handlers::get_items_by_tag,
        handlers::get_published_items, handlers::get_many_items, handlers::copy_item,
        handlers::reject_item_upload, handlers::reject_thumbnail_upload,
        handlers::reject_item_update, handlers::get_many_item_memberships,
        handlers::get_member, handlers::get_many_members, handlers::reject_avatar_upload,
        handlers::reject_member_update
    ),
    // Bodies of requests and responses.
    components(
        schemas(
            models::Item, models::ItemMembership, models::PermissionLevel, models::Member,
            models::ItemWithMemberships, models::PublicItem, models::CopyItemRequest,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "graasp-public", description = "Anonymous access to public Graasp items")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state of the service. Cloned per request; everything inside is
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Query orchestrator, holding the repository and the visibility tags.
    pub service: PublicItemService,
    /// Repository, also needed by the `AuthUser` extractor.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the orchestrator from the configured tag ids.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let visibility = Visibility::new(config.public_tag_id, config.published_tag_id);
        Self {
            service: PublicItemService::new(repo.clone(), visibility),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and extractors pull single components out of the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PublicItemService {
    fn from_ref(app_state: &AppState) -> PublicItemService {
        app_state.service.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces a caller identity on the `authenticated_routes`.
///
/// *Mechanism*: the `AuthUser` argument runs the extractor before the handler. If the
/// caller cannot be identified the request is rejected with 401, and if the member lookup
/// itself fails it is rejected with the storage error (500). Otherwise the request
/// proceeds.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routes under the configured prefix, the health check and the docs, then
/// applies the request id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    // The public surface is read by any origin.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Prefixed Routes
    // Anonymous reads and edit gates, plus the copy route behind `auth_middleware`.
    let prefixed = public::public_routes().merge(
        authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        )),
    );

    // 3. Base Router Assembly
    let base_router = Router::new()
        // Documentation: the generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .nest(&state.config.route_prefix, prefixed)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: one UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, carrying its id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: the id is echoed back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span of one HTTP request, used by `TraceLayer`: method, uri and the `x-request-id` set by
/// the layer above.
///
/// *Goal*: every log line of one request, including the task transitions of the operation
/// it runs, is correlated by the same id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
