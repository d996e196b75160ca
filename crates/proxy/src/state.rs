//! Application state shared across handlers.

use std::sync::Arc;

use catalog_core::types::EnrichedProduct;
use moka::future::Cache;

use crate::cache::CachedBody;
use crate::config::ProxyConfig;
use crate::upstream::{UpstreamClient, UpstreamError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds the upstream client and the three
/// response caches.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ProxyConfig,
    upstream: UpstreamClient,
    /// Serialized listing responses keyed by upstream URL.
    listings: Cache<String, Arc<CachedBody>>,
    /// Serialized category list keyed by upstream URL.
    categories: Cache<String, Arc<CachedBody>>,
    /// Enriched single products keyed by ID.
    products: Cache<u64, Arc<EnrichedProduct>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream HTTP client cannot be built.
    pub fn new(config: ProxyConfig) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::new(&config.upstream)?;

        let listings = Cache::builder()
            .max_capacity(config.cache.max_capacity)
            .time_to_live(config.cache.listing_ttl)
            .build();
        let categories = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.cache.category_ttl)
            .build();
        let products = Cache::builder()
            .max_capacity(config.cache.max_capacity)
            .time_to_live(config.cache.listing_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                upstream,
                listings,
                categories,
                products,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn upstream(&self) -> &UpstreamClient {
        &self.inner.upstream
    }

    #[must_use]
    pub fn listings(&self) -> &Cache<String, Arc<CachedBody>> {
        &self.inner.listings
    }

    #[must_use]
    pub fn categories(&self) -> &Cache<String, Arc<CachedBody>> {
        &self.inner.categories
    }

    #[must_use]
    pub fn products(&self) -> &Cache<u64, Arc<EnrichedProduct>> {
        &self.inner.products
    }
}
