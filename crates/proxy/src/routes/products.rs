//! Product listing, category and detail handlers.
//!
//! Listings are enriched, serialized once and cached by upstream URL. Every
//! listing response carries `Cache-Control`, `X-Cache`, `ETag` and
//! `X-Fetched-At`, and a matching `If-None-Match` yields 304.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
};
use catalog_core::filters::IntParam;
use catalog_core::types::EnrichedProduct;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::cache::CachedBody;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upstream::{ListingQuery, RetryPolicy, UpstreamError};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_FETCHED_AT: HeaderName = HeaderName::from_static("x-fetched-at");

const ACTION_CATEGORIES: &str = "categories";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    const fn header(self) -> HeaderValue {
        match self {
            Self::Hit => HeaderValue::from_static("HIT"),
            Self::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Raw listing query parameters. Everything arrives as text so malformed
/// numbers can fall back instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub delay: Option<String>,
    pub retries: Option<String>,
}

impl ListParams {
    fn listing_query(&self) -> ListingQuery {
        ListingQuery::from_raw(
            self.q.as_deref(),
            self.category.as_deref(),
            self.sort.as_deref(),
            self.order.as_deref(),
            self.page.as_deref(),
            self.limit.as_deref(),
        )
    }

    /// Requested simulated latency, clamped to `max`.
    fn delay(&self, max: Duration) -> Duration {
        let millis = non_negative(self.delay.as_deref());
        Duration::from_millis(millis).min(max)
    }

    fn retries(&self) -> u32 {
        u32::try_from(non_negative(self.retries.as_deref())).unwrap_or(u32::MAX)
    }
}

fn non_negative(raw: Option<&str>) -> u64 {
    raw.and_then(|s| IntParam::parse(s).value())
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}

/// List or search products.
#[instrument(skip(state, headers))]
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Response> {
    let config = state.config();
    let max_age = config.cache.listing_ttl;

    let url = state
        .upstream()
        .listing_url(&params.listing_query())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let key = url.to_string();

    if let Some(cached) = state.listings().get(&key).await {
        debug!(key = %key, "listing cache hit");
        return Ok(cached_response(&cached, CacheStatus::Hit, max_age, &headers));
    }
    debug!(key = %key, "listing cache miss");

    let delay = params.delay(config.max_simulated_delay);
    if !delay.is_zero() {
        debug!(delay = ?delay, "simulating upstream latency");
        tokio::time::sleep(delay).await;
    }

    let policy = RetryPolicy::new(params.retries(), &config.retry);
    let upstream = state.upstream();
    let listing = policy
        .run(|_| upstream.fetch_listing(&url))
        .await
        .map_err(|source| AppError::Products {
            attempts: policy.attempts(),
            source,
        })?;

    let now = Utc::now();
    let enriched = listing.enrich(&config.price_format, now);
    let cached = Arc::new(CachedBody::new(&enriched, now)?);
    state.listings().insert(key, Arc::clone(&cached)).await;

    Ok(cached_response(&cached, CacheStatus::Miss, max_age, &headers))
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ActionParams {
    pub action: Option<String>,
}

/// POST entry point. `action` comes from the query string, else from a JSON
/// body. Only `categories` is supported.
#[instrument(skip(state, headers, body))]
pub async fn action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ActionParams>,
    body: Bytes,
) -> Result<Response> {
    let action = params.action.or_else(|| {
        serde_json::from_slice::<ActionParams>(&body)
            .ok()
            .and_then(|b| b.action)
    });

    match action.as_deref() {
        Some(ACTION_CATEGORIES) => categories(&state, &headers).await,
        other => {
            debug!(action = ?other, "rejecting unknown action");
            Err(AppError::InvalidAction)
        }
    }
}

async fn categories(state: &AppState, headers: &HeaderMap) -> Result<Response> {
    let max_age = state.config().cache.category_ttl;
    let key = state
        .upstream()
        .categories_url()
        .map_err(AppError::Categories)?
        .to_string();

    if let Some(cached) = state.categories().get(&key).await {
        debug!("category cache hit");
        return Ok(cached_response(&cached, CacheStatus::Hit, max_age, headers));
    }

    let list = state
        .upstream()
        .fetch_categories()
        .await
        .map_err(AppError::Categories)?;
    let cached = Arc::new(CachedBody::new(&list, Utc::now())?);
    state.categories().insert(key, Arc::clone(&cached)).await;

    Ok(cached_response(&cached, CacheStatus::Miss, max_age, headers))
}

// =============================================================================
// Detail
// =============================================================================

/// A single enriched product.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id: u64 = id.parse().map_err(|_| AppError::ProductNotFound)?;
    let max_age = state.config().cache.listing_ttl;

    let (product, status) = if let Some(product) = state.products().get(&id).await {
        (product, CacheStatus::Hit)
    } else {
        let product = state
            .upstream()
            .fetch_product(id)
            .await
            .map_err(|e| match e {
                UpstreamError::Status { .. } => AppError::ProductNotFound,
                other => AppError::Product(other),
            })?;
        let product: Arc<EnrichedProduct> =
            Arc::new(product.enrich(&state.config().price_format, Utc::now()));
        state.products().insert(id, Arc::clone(&product)).await;
        (product, CacheStatus::Miss)
    };

    let mut response = Json(product.as_ref()).into_response();
    let headers = response.headers_mut();
    insert_cache_control(headers, max_age);
    headers.insert(X_CACHE, status.header());
    Ok(response)
}

// =============================================================================
// Response helpers
// =============================================================================

fn cached_response(
    cached: &CachedBody,
    status: CacheStatus,
    max_age: Duration,
    request_headers: &HeaderMap,
) -> Response {
    let not_modified = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| cached.matches(v));

    let mut response = if not_modified {
        debug!(etag = %cached.etag, "conditional request matched");
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            cached.body.clone(),
        )
            .into_response()
    };

    let headers = response.headers_mut();
    insert_cache_control(headers, max_age);
    headers.insert(X_CACHE, status.header());
    if let Ok(etag) = HeaderValue::from_str(&cached.etag) {
        headers.insert(ETAG, etag);
    }
    let fetched_at = cached
        .fetched_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&fetched_at) {
        headers.insert(X_FETCHED_AT, value);
    }

    response
}

fn insert_cache_control(headers: &mut HeaderMap, max_age: Duration) {
    let directive = format!("public, max-age={}", max_age.as_secs());
    if let Ok(value) = HeaderValue::from_str(&directive) {
        headers.insert(CACHE_CONTROL, value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::Request,
        routing::get,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::config::ProxyConfig;

    #[derive(Clone, Default)]
    struct Hits(Arc<AtomicUsize>);

    impl Hits {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        fn bump(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn product_json(id: u64, stock: i64) -> Value {
        json!({
            "id": id,
            "title": format!("Product {id}"),
            "description": "A product",
            "price": 100,
            "stock": stock,
            "category": "smartphones",
            "images": []
        })
    }

    fn healthy_upstream(hits: Hits) -> Router {
        Router::new()
            .route(
                "/products",
                get(|State(hits): State<Hits>| async move {
                    hits.bump();
                    Json(json!({
                        "products": [product_json(1, 0), product_json(2, 3), product_json(3, 50)],
                        "total": 3,
                        "skip": 0,
                        "limit": 12
                    }))
                }),
            )
            .route(
                "/products/categories",
                get(|State(hits): State<Hits>| async move {
                    hits.bump();
                    Json(json!([{ "slug": "beauty", "name": "Beauty" }]))
                }),
            )
            .route(
                "/products/{id}",
                get(|Path(id): Path<u64>| async move {
                    if id == 1 {
                        Json(product_json(1, 10)).into_response()
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })))
                            .into_response()
                    }
                }),
            )
            .with_state(hits)
    }

    fn failing_upstream(hits: Hits) -> Router {
        Router::new()
            .route(
                "/products",
                get(|State(hits): State<Hits>| async move {
                    hits.bump();
                    StatusCode::SERVICE_UNAVAILABLE
                }),
            )
            .route(
                "/products/categories",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .route(
                "/products/{id}",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            )
            .with_state(hits)
    }

    async fn spawn(upstream: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    async fn proxy_for(upstream: Router) -> Router {
        let mut config = ProxyConfig::with_upstream(spawn(upstream).await);
        config.retry.backoff_base = Duration::from_millis(1);
        crate::app(AppState::new(config).unwrap(), None)
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, HeaderMap, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    fn get_req(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_delay_is_clamped() {
        let params = ListParams {
            delay: Some("999999".to_string()),
            ..ListParams::default()
        };
        assert_eq!(
            params.delay(Duration::from_millis(5000)),
            Duration::from_millis(5000)
        );

        let params = ListParams {
            delay: Some("-5".to_string()),
            ..ListParams::default()
        };
        assert_eq!(params.delay(Duration::from_millis(5000)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_list_enriches_and_caches() {
        let hits = Hits::default();
        let app = proxy_for(healthy_upstream(hits.clone())).await;

        let (status, headers, body) = send(&app, get_req("/api/products")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[&X_CACHE], "MISS");
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=300");
        assert!(headers.contains_key(ETAG));
        assert!(headers.contains_key(&X_FETCHED_AT));

        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["total"], 3);
        assert_eq!(body["products"][0]["availability"], "out_of_stock");
        assert_eq!(body["products"][1]["availability"], "low_stock");
        assert_eq!(body["products"][2]["availability"], "in_stock");
        assert!(body["products"][0]["displayPrice"].is_string());
        assert!(body["products"][0]["retrievedAt"].is_string());

        let (status, second, _) = send(&app, get_req("/api/products")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second[&X_CACHE], "HIT");
        assert_eq!(second[ETAG], headers[ETAG]);
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_list_not_modified() {
        let app = proxy_for(healthy_upstream(Hits::default())).await;

        let (_, headers, _) = send(&app, get_req("/api/products")).await;
        let etag = headers[ETAG].to_str().unwrap().to_string();

        let request = Request::builder()
            .uri("/api/products")
            .header(IF_NONE_MATCH, etag)
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::NOT_MODIFIED);
        assert!(body.is_empty());
        assert_eq!(headers[&X_CACHE], "HIT");
    }

    #[tokio::test]
    async fn test_list_retries_then_fails() {
        let hits = Hits::default();
        let app = proxy_for(failing_upstream(hits.clone())).await;

        let (status, _, body) = send(&app, get_req("/api/products?retries=2")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hits.count(), 2);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Failed to fetch products");
        assert!(body["message"].as_str().unwrap().contains('2'));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_list_without_retries_tries_once() {
        let hits = Hits::default();
        let app = proxy_for(failing_upstream(hits.clone())).await;

        let (status, _, _) = send(&app, get_req("/api/products")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_categories_action() {
        let hits = Hits::default();
        let app = proxy_for(healthy_upstream(hits.clone())).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/products?action=categories")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=3600");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!([{ "slug": "beauty", "name": "Beauty" }]));

        let request = Request::builder()
            .method("POST")
            .uri("/api/products")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"categories"}"#))
            .unwrap();
        let (status, headers, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[&X_CACHE], "HIT");
        assert_eq!(hits.count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_action() {
        let app = proxy_for(healthy_upstream(Hits::default())).await;

        for uri in ["/api/products?action=delete", "/api/products"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, _, body) = send(&app, request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(body, json!({ "error": "Invalid action" }));
        }
    }

    #[tokio::test]
    async fn test_categories_upstream_failure() {
        let app = proxy_for(failing_upstream(Hits::default())).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/products?action=categories")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Failed to fetch categories" }));
    }

    #[tokio::test]
    async fn test_show_product() {
        let app = proxy_for(healthy_upstream(Hits::default())).await;

        let (status, headers, body) = send(&app, get_req("/api/products/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[&X_CACHE], "MISS");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(body["availability"], "in_stock");

        let (status, _, _) = send(&app, get_req("/api/products/99")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = send(&app, get_req("/api/products/not-a-number")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Product not found" }));
    }

    #[tokio::test]
    async fn test_show_maps_any_upstream_status_to_not_found() {
        let app = proxy_for(failing_upstream(Hits::default())).await;

        let (status, _, body) = send(&app, get_req("/api/products/7")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "error": "Product not found" }));
    }
}
