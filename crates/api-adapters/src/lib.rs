//! # api-adapters
//!
//! HTTP surface of the feed core. The axum router lives behind `web-axum`;
//! the metrics registry is framework-independent.

pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use state::{AppState, Ports};

#[cfg(feature = "web-axum")]
use axum::{
    routing::{get, post, put},
    Router,
};
#[cfg(feature = "web-axum")]
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Builds the full application router.
///
/// Everything under `/api/v1` requires a bearer token; `/health` and
/// `/metrics` are open.
#[cfg(feature = "web-axum")]
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/posts", get(handlers::list_feed).post(handlers::create_post))
        .route("/posts/pending", get(handlers::list_pending))
        .route("/posts/mine", get(handlers::list_mine))
        .route("/posts/by-author", get(handlers::list_by_author))
        .route(
            "/posts/{id}",
            get(handlers::get_post)
                .put(handlers::edit_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/{id}/status", put(handlers::set_status))
        .route(
            "/posts/{id}/inspire",
            post(handlers::like).delete(handlers::unlike),
        )
        .route("/notifications", post(handlers::broadcast))
        .route("/notifications/users/{id}", get(handlers::list_notifications));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
