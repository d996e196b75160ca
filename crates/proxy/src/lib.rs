//! Catalog proxy library.
//!
//! Forwards listing, search, category and detail requests to the upstream
//! product API, enriches products with display fields and caches the
//! responses. Exposed as a library so the router can be driven in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upstream;

use axum::{Router, extract::Request, routing::get};
use tower_http::trace::TraceLayer;

use crate::middleware::{RateLimiterLayer, request_id_middleware};
use crate::state::AppState;

/// Build the full router.
///
/// `rate_limit` wraps only the `/api` routes. Tests pass `None` because
/// `oneshot` requests carry no peer address.
pub fn app(state: AppState, rate_limit: Option<RateLimiterLayer>) -> Router {
    let api = routes::api_routes();
    let api = match rate_limit {
        Some(layer) => api.layer(layer),
        None => api,
    };

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}
