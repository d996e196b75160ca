//! HTTP route handlers for the proxy.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health             - Liveness check
//!
//! # Products
//! GET  /api/products       - List or search, enriched and cached
//! POST /api/products       - Actions (`action=categories`)
//! GET  /api/products/{id}  - Single enriched product
//! ```

pub mod products;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the product API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::list).post(products::action))
        .route("/products/{id}", get(products::show))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check upstream.
pub async fn health() -> &'static str {
    "ok"
}
