//! Product query with fetch caching and supersession.
//!
//! A [`ProductQuery`] turns fetch parameters into visible state:
//!
//! ```text
//! Idle -> Loading -> Succeeded | Failed
//!            ^            |
//!            +-- params --+
//! ```
//!
//! Only the most recently issued fingerprint may commit. A response for an
//! older fingerprint is dropped even if it arrives last, and a cancelled
//! fetch never produces an error state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use catalog_core::cache::{Clock, SystemClock, TtlCache};
use catalog_core::fetch::{FetchParams, Fingerprint, Pagination};
use catalog_core::filters::FilterState;
use catalog_core::types::{EnrichedProduct, ProductListing};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::source::{FetchError, FetchOptions, ProductRequest, ProductSource};

// =============================================================================
// Cache
// =============================================================================

/// Lifetime of a cached product page.
pub const FETCH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Product pages by fingerprint. Share one instance across queries.
pub type FetchCache<C = SystemClock> = TtlCache<Fingerprint, ProductPage, C>;

/// A fetch cache on the system clock with the standard TTL.
#[must_use]
pub fn fetch_cache() -> FetchCache {
    TtlCache::new(FETCH_CACHE_TTL)
}

/// One fetched page of products.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
    pub items: Vec<EnrichedProduct>,
    pub total_count: u64,
}

impl From<ProductListing> for ProductPage {
    fn from(listing: ProductListing) -> Self {
        Self {
            items: listing.products,
            total_count: listing.total,
        }
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Error payload of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    pub status_code: u16,
    pub retries_attempted: u32,
}

impl ApiError {
    fn from_fetch_error(err: &FetchError, options: FetchOptions) -> Self {
        Self {
            message: err.to_string(),
            status_code: err.status_code().unwrap_or(500),
            retries_attempted: options.retries,
        }
    }
}

/// What a consumer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub status: FetchStatus,
    pub products: Vec<EnrichedProduct>,
    pub total: u64,
    pub error: Option<ApiError>,
    pub params: FetchParams,
    pub pagination: Pagination,
}

impl Default for QueryState {
    fn default() -> Self {
        let params = FetchParams::default();
        Self {
            status: FetchStatus::Idle,
            products: Vec::new(),
            total: 0,
            error: None,
            pagination: Pagination::derive(0, params.page, params.limit),
            params,
        }
    }
}

impl QueryState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    fn repaginate(&mut self) {
        self.pagination = Pagination::derive(self.total, self.params.page, self.params.limit);
    }
}

// =============================================================================
// Query
// =============================================================================

#[derive(Debug)]
struct Current {
    fingerprint: Fingerprint,
    params: FetchParams,
    in_flight: Option<CancellationToken>,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<Current>,
    torn_down: bool,
}

struct Shared<S, C> {
    source: S,
    cache: Arc<FetchCache<C>>,
    options: FetchOptions,
    inner: Mutex<Inner>,
    state: watch::Sender<QueryState>,
}

impl<S, C> Shared<S, C> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tear_down(&self) {
        let mut inner = self.lock();
        inner.torn_down = true;
        if let Some(token) = inner.current.as_mut().and_then(|c| c.in_flight.take()) {
            token.cancel();
        }
    }
}

/// Product query bound to one consumer.
///
/// Dropping the query cancels its in-flight fetch and blocks any late
/// result from committing.
pub struct ProductQuery<S, C = SystemClock> {
    shared: Arc<Shared<S, C>>,
}

impl<S, C> ProductQuery<S, C>
where
    S: ProductSource,
    C: Clock + 'static,
{
    /// Create an idle query.
    #[must_use]
    pub fn new(source: S, cache: Arc<FetchCache<C>>, options: FetchOptions) -> Self {
        let (state, _rx) = watch::channel(QueryState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                cache,
                options,
                inner: Mutex::new(Inner::default()),
                state,
            }),
        }
    }

    /// Current visible state.
    #[must_use]
    pub fn state(&self) -> QueryState {
        self.shared.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.shared.state.subscribe()
    }

    /// Point the query at `params`.
    ///
    /// No-op if the fingerprint is unchanged. A fresh cache entry commits
    /// immediately. Otherwise a fetch is spawned and its handle returned.
    pub fn set_params(&self, params: FetchParams) -> Option<JoinHandle<()>> {
        let fingerprint = params.fingerprint();
        let mut inner = self.shared.lock();
        if inner.torn_down
            || inner
                .current
                .as_ref()
                .is_some_and(|c| c.fingerprint == fingerprint)
        {
            return None;
        }
        self.start(&mut inner, params, fingerprint, true)
    }

    /// Follow a filter state snapshot. Ignored until it is initialized.
    pub fn sync(&self, filters: &FilterState) -> Option<JoinHandle<()>> {
        if !filters.initialized {
            return None;
        }
        self.set_params(FetchParams::from_filters(filters))
    }

    /// Track a filter store until its sender closes.
    pub async fn follow(&self, mut filters: watch::Receiver<FilterState>) {
        loop {
            let snapshot = filters.borrow_and_update().clone();
            self.sync(&snapshot);
            if filters.changed().await.is_err() {
                break;
            }
        }
    }

    /// Drop the cache entry for the current parameters and fetch again.
    pub fn refetch(&self) -> Option<JoinHandle<()>> {
        let mut inner = self.shared.lock();
        if inner.torn_down {
            return None;
        }
        let current = inner.current.as_ref()?;
        let params = current.params.clone();
        let fingerprint = current.fingerprint.clone();

        self.shared.cache.remove(&fingerprint);
        self.start(&mut inner, params, fingerprint, false)
    }

    /// Cancel outstanding work. Nothing commits afterwards.
    pub fn shutdown(&self) {
        self.shared.tear_down();
    }

    fn start(
        &self,
        inner: &mut Inner,
        params: FetchParams,
        fingerprint: Fingerprint,
        use_cache: bool,
    ) -> Option<JoinHandle<()>> {
        if let Some(token) = inner.current.take().and_then(|c| c.in_flight) {
            token.cancel();
        }

        if use_cache && let Some(page) = self.shared.cache.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, "product cache hit");
            inner.current = Some(Current {
                fingerprint,
                params: params.clone(),
                in_flight: None,
            });
            self.shared.state.send_modify(|state| {
                state.params = params;
                commit_page(state, page);
            });
            return None;
        }

        let token = CancellationToken::new();
        inner.current = Some(Current {
            fingerprint: fingerprint.clone(),
            params: params.clone(),
            in_flight: Some(token.clone()),
        });
        self.shared.state.send_modify(|state| {
            state.status = FetchStatus::Loading;
            state.error = None;
            state.params = params.clone();
            state.repaginate();
        });

        let request = ProductRequest {
            params,
            options: self.shared.options,
        };
        Some(tokio::spawn(run_fetch(
            Arc::clone(&self.shared),
            fingerprint,
            request,
            token,
        )))
    }
}

impl<S, C> Drop for ProductQuery<S, C> {
    fn drop(&mut self) {
        self.shared.tear_down();
    }
}

fn commit_page(state: &mut QueryState, page: ProductPage) {
    state.status = FetchStatus::Succeeded;
    state.products = page.items;
    state.total = page.total_count;
    state.error = None;
    state.repaginate();
}

async fn run_fetch<S, C>(
    shared: Arc<Shared<S, C>>,
    fingerprint: Fingerprint,
    request: ProductRequest,
    token: CancellationToken,
) where
    S: ProductSource,
    C: Clock + 'static,
{
    let result = shared.source.fetch(&request, token.clone()).await;

    let mut inner = shared.lock();
    let is_current = !inner.torn_down
        && !token.is_cancelled()
        && inner
            .current
            .as_ref()
            .is_some_and(|c| c.fingerprint == fingerprint);
    if !is_current {
        debug!(fingerprint = %fingerprint, "discarding superseded fetch");
        return;
    }
    if let Some(current) = inner.current.as_mut() {
        current.in_flight = None;
    }

    match result {
        Ok(listing) => {
            let page = ProductPage::from(listing);
            shared.cache.insert(fingerprint, page.clone());
            shared.state.send_modify(|state| commit_page(state, page));
        }
        Err(e) if e.is_cancellation() => {
            debug!(fingerprint = %fingerprint, "fetch cancelled");
        }
        Err(e) => {
            warn!(fingerprint = %fingerprint, error = %e, "product fetch failed");
            let error = ApiError::from_fetch_error(&e, request.options);
            shared.state.send_modify(|state| {
                state.status = FetchStatus::Failed;
                state.products.clear();
                state.total = 0;
                state.error = Some(error);
                state.repaginate();
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use catalog_core::cache::ManualClock;
    use catalog_core::filters::IntParam;
    use catalog_core::types::{PriceFormat, Product};
    use chrono::Utc;
    use tokio::sync::oneshot;

    use super::*;

    fn product(id: u64) -> EnrichedProduct {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("Product {id}"),
            "price": 10.0,
            "stock": 20,
        }))
        .unwrap();
        product.enrich(&PriceFormat::default(), Utc::now())
    }

    fn listing(ids: &[u64], total: u64) -> ProductListing {
        ProductListing {
            products: ids.iter().copied().map(product).collect(),
            total,
            skip: 0,
            limit: 12,
        }
    }

    fn params(query: &str) -> FetchParams {
        FetchParams {
            query: Some(query.to_string()),
            ..FetchParams::default()
        }
    }

    /// Answers every request with the same listing and counts calls.
    #[derive(Clone)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        total: u64,
    }

    impl CountingSource {
        fn new(total: u64) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                total,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ProductSource for CountingSource {
        async fn fetch(
            &self,
            _request: &ProductRequest,
            _cancel: CancellationToken,
        ) -> Result<ProductListing, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(listing(&[1, 2], self.total))
        }
    }

    /// Resolves each request only when the test says so, ignoring cancellation.
    #[derive(Default)]
    struct ScriptedSource {
        pending: Mutex<HashMap<Option<String>, oneshot::Receiver<Result<ProductListing, FetchError>>>>,
    }

    impl ScriptedSource {
        fn script(&self, query: &str) -> oneshot::Sender<Result<ProductListing, FetchError>> {
            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .unwrap()
                .insert(Some(query.to_string()), rx);
            tx
        }
    }

    impl ProductSource for ScriptedSource {
        async fn fetch(
            &self,
            request: &ProductRequest,
            _cancel: CancellationToken,
        ) -> Result<ProductListing, FetchError> {
            let rx = self
                .pending
                .lock()
                .unwrap()
                .remove(&request.params.query)
                .unwrap();
            rx.await.unwrap()
        }
    }

    struct FailingSource(fn() -> FetchError);

    impl ProductSource for FailingSource {
        async fn fetch(
            &self,
            _request: &ProductRequest,
            _cancel: CancellationToken,
        ) -> Result<ProductListing, FetchError> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn test_cache_hit_avoids_network_call() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(TtlCache::with_clock(FETCH_CACHE_TTL, Arc::clone(&clock)));
        let source = CountingSource::new(2);

        let first = ProductQuery::new(source.clone(), Arc::clone(&cache), FetchOptions::default());
        first.set_params(params("phone")).unwrap().await.unwrap();
        assert_eq!(source.calls(), 1);

        let second = ProductQuery::new(source.clone(), Arc::clone(&cache), FetchOptions::default());
        assert!(second.set_params(params("phone")).is_none());
        assert_eq!(second.state().status, FetchStatus::Succeeded);
        assert_eq!(second.state().products.len(), 2);
        assert_eq!(source.calls(), 1);

        clock.advance(FETCH_CACHE_TTL + Duration::from_secs(1));
        let third = ProductQuery::new(source.clone(), Arc::clone(&cache), FetchOptions::default());
        third.set_params(params("phone")).unwrap().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_same_fingerprint_is_no_op() {
        let source = CountingSource::new(2);
        let query = ProductQuery::new(source.clone(), Arc::new(fetch_cache()), FetchOptions::default());

        query.set_params(params("tv")).unwrap().await.unwrap();
        assert!(query.set_params(params("tv")).is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_superseded_result_is_discarded() {
        let source = ScriptedSource::default();
        let resolve_a = source.script("a");
        let resolve_b = source.script("b");
        let query = ProductQuery::new(source, Arc::new(fetch_cache()), FetchOptions::default());

        let fetch_a = query.set_params(params("a")).unwrap();
        let fetch_b = query.set_params(params("b")).unwrap();
        assert!(query.state().is_loading());

        resolve_b.send(Ok(listing(&[20], 1))).unwrap();
        fetch_b.await.unwrap();
        resolve_a.send(Ok(listing(&[10], 1))).unwrap();
        fetch_a.await.unwrap();

        let state = query.state();
        assert_eq!(state.status, FetchStatus::Succeeded);
        assert_eq!(state.products.first().unwrap().product.id, 20);
        assert_eq!(state.params.query.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_failure_clears_products() {
        let cache = Arc::new(fetch_cache());
        let ok = ProductQuery::new(CountingSource::new(2), Arc::clone(&cache), FetchOptions::default());
        ok.set_params(params("a")).unwrap().await.unwrap();

        let options = FetchOptions {
            retries: 2,
            delay_ms: 0,
        };
        let query = ProductQuery::new(
            FailingSource(|| FetchError::Status {
                status: 500,
                message: "Failed to fetch products".to_string(),
            }),
            cache,
            options,
        );
        query.set_params(params("b")).unwrap().await.unwrap();

        let state = query.state();
        assert_eq!(state.status, FetchStatus::Failed);
        assert!(state.products.is_empty());
        assert_eq!(state.total, 0);
        let error = state.error.unwrap();
        assert_eq!(error.status_code, 500);
        assert_eq!(error.retries_attempted, 2);
        assert!(error.message.contains("Failed to fetch products"));
    }

    #[tokio::test]
    async fn test_transport_error_reports_500() {
        let query = ProductQuery::new(
            FailingSource(|| FetchError::Parse(serde_json::from_str::<u8>("x").unwrap_err())),
            Arc::new(fetch_cache()),
            FetchOptions::default(),
        );
        query.set_params(params("a")).unwrap().await.unwrap();

        assert_eq!(query.state().error.unwrap().status_code, 500);
    }

    #[tokio::test]
    async fn test_cancellation_error_is_not_a_failure() {
        let query = ProductQuery::new(
            FailingSource(|| FetchError::Cancelled),
            Arc::new(fetch_cache()),
            FetchOptions::default(),
        );
        query.set_params(params("a")).unwrap().await.unwrap();

        let state = query.state();
        assert_eq!(state.status, FetchStatus::Loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_refetch_bypasses_fresh_cache() {
        let source = CountingSource::new(2);
        let cache = Arc::new(fetch_cache());
        let query = ProductQuery::new(source.clone(), Arc::clone(&cache), FetchOptions::default());

        query.set_params(params("a")).unwrap().await.unwrap();
        query.refetch().unwrap().await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(query.state().status, FetchStatus::Succeeded);
        assert!(cache.get(&params("a").fingerprint()).is_some());
    }

    #[tokio::test]
    async fn test_pagination_from_total() {
        let query = ProductQuery::new(
            CountingSource::new(100),
            Arc::new(fetch_cache()),
            FetchOptions::default(),
        );
        let page_two = FetchParams {
            page: IntParam::Value(2),
            limit: IntParam::Value(30),
            ..FetchParams::default()
        };
        query.set_params(page_two).unwrap().await.unwrap();

        let pagination = query.state().pagination;
        assert_eq!(pagination.total_pages, 4);
        assert!(pagination.has_previous_page);
        assert!(pagination.has_next_page);
    }

    #[tokio::test]
    async fn test_shutdown_blocks_late_result() {
        let source = ScriptedSource::default();
        let resolve = source.script("a");
        let query = ProductQuery::new(source, Arc::new(fetch_cache()), FetchOptions::default());

        let fetch = query.set_params(params("a")).unwrap();
        query.shutdown();
        resolve.send(Ok(listing(&[1], 1))).unwrap();
        fetch.await.unwrap();

        assert_eq!(query.state().status, FetchStatus::Loading);
        assert!(query.set_params(params("b")).is_none());
    }

    #[tokio::test]
    async fn test_sync_waits_for_initialized_filters() {
        let source = CountingSource::new(2);
        let query = ProductQuery::new(source.clone(), Arc::new(fetch_cache()), FetchOptions::default());

        assert!(query.sync(&FilterState::default()).is_none());
        assert_eq!(query.state().status, FetchStatus::Idle);

        let initialized = FilterState {
            initialized: true,
            ..FilterState::default()
        };
        query.sync(&initialized).unwrap().await.unwrap();
        assert_eq!(source.calls(), 1);
    }
}
