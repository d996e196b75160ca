//! Integration test support for the catalog workspace.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p catalog-integration-tests
//! ```
//!
//! Everything runs in-process on loopback ports: a [`MockUpstream`] stands in
//! for the product API, [`spawn_proxy`] serves the real proxy router against
//! it, and tests drive that proxy through `catalog-client` or plain `reqwest`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use catalog_proxy::config::ProxyConfig;
use catalog_proxy::state::AppState;
use serde_json::{Value, json};
use url::Url;

/// Number of products in the mock catalog.
pub const CATALOG_SIZE: u64 = 100;

const CATEGORIES: [&str; 4] = ["smartphones", "laptops", "fragrances", "groceries"];

// =============================================================================
// Mock Upstream
// =============================================================================

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

/// In-process stand-in for the upstream product API.
///
/// Serves 100 generated products across four categories. Every request URI
/// is recorded, and the whole server can be switched to answer 503.
pub struct MockUpstream {
    pub url: Url,
    state: MockState,
}

impl MockUpstream {
    /// Bind to an ephemeral loopback port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = MockState::default();
        let router = Router::new().fallback(handle).with_state(state.clone());
        let addr = serve(router).await?;

        Ok(Self {
            url: loopback_url(addr)?,
            state,
        })
    }

    /// Request URIs (path and query) received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose path starts with `prefix`.
    #[must_use]
    pub fn hits(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|uri| uri.starts_with(prefix))
            .count()
    }

    /// Make every subsequent request fail with 503.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }
}

/// The mock catalog's product with `id`, upstream shape.
#[must_use]
pub fn mock_product(id: u64) -> Value {
    let category = CATEGORIES
        .get(usize::try_from(id % 4).unwrap_or_default())
        .copied()
        .unwrap_or("smartphones");
    let title = if id % 10 == 0 {
        format!("Phone Case {id}")
    } else {
        format!("Product {id}")
    };

    json!({
        "id": id,
        "title": title,
        "description": format!("Description of product {id}"),
        "price": 10 * id,
        "discountPercentage": 5.5,
        "rating": 4.2,
        "stock": id % 7,
        "brand": "Acme",
        "category": category,
        "thumbnail": format!("https://cdn.example.com/{id}/thumbnail.jpg"),
        "images": [],
        "tags": ["mock"]
    })
}

async fn handle(
    State(state): State<MockState>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let recorded = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    state
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(recorded);

    if state.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let path = uri.path();
    if path == "/products/categories" {
        let list: Vec<Value> = CATEGORIES
            .iter()
            .map(|slug| {
                json!({
                    "slug": slug,
                    "name": slug,
                    "url": format!("/products/category/{slug}")
                })
            })
            .collect();
        return Json(list).into_response();
    }

    let filter: Box<dyn Fn(&Value) -> bool + Send> = if path == "/products" {
        Box::new(|_| true)
    } else if path == "/products/search" {
        let q = params.get("q").cloned().unwrap_or_default().to_lowercase();
        Box::new(move |p| {
            p["title"]
                .as_str()
                .is_some_and(|t| t.to_lowercase().contains(&q))
        })
    } else if let Some(slug) = path.strip_prefix("/products/category/") {
        let slug = slug.to_string();
        Box::new(move |p| p["category"] == slug.as_str())
    } else if let Some(id) = path
        .strip_prefix("/products/")
        .and_then(|id| id.parse::<u64>().ok())
        .filter(|id| (1..=CATALOG_SIZE).contains(id))
    {
        return Json(mock_product(id)).into_response();
    } else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("'{path}' not found") })),
        )
            .into_response();
    };

    let number = |key: &str, default: usize| {
        params
            .get(key)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default)
    };
    let limit = number("limit", 30);
    let skip = number("skip", 0);

    let mut matching: Vec<Value> = (1..=CATALOG_SIZE)
        .map(mock_product)
        .filter(|p| filter(p))
        .collect();
    if params.get("sortBy").is_some_and(|s| s == "price") {
        matching.sort_by_key(|p| p["price"].as_u64().unwrap_or_default());
        if params.get("order").is_some_and(|o| o == "desc") {
            matching.reverse();
        }
    }

    let total = matching.len();
    let products: Vec<Value> = matching.into_iter().skip(skip).take(limit).collect();
    Json(json!({
        "products": products,
        "total": total,
        "skip": skip,
        "limit": limit
    }))
    .into_response()
}

// =============================================================================
// Proxy
// =============================================================================

/// Proxy configuration pointed at `upstream`, with millisecond backoff so
/// retry tests stay fast.
#[must_use]
pub fn proxy_config(upstream: &MockUpstream) -> ProxyConfig {
    let mut config = ProxyConfig::with_upstream(upstream.url.clone());
    config.retry.backoff_base = Duration::from_millis(1);
    config
}

/// Serve the proxy router on an ephemeral loopback port.
///
/// # Errors
///
/// Returns an error if the state cannot be built or the port cannot be bound.
pub async fn spawn_proxy(config: ProxyConfig) -> Result<Url, Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;
    let addr = serve(catalog_proxy::app(state, None)).await?;
    Ok(loopback_url(addr)?)
}

async fn serve(router: Router) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

fn loopback_url(addr: SocketAddr) -> std::io::Result<Url> {
    Url::parse(&format!("http://{addr}"))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}
