//! Client for the upstream product API.
//!
//! # Paths
//!
//! ```text
//! GET /products/search?q=..&limit=..&skip=..     - free-text search
//! GET /products/category/{slug}?limit=..&skip=.. - one category
//! GET /products?limit=..&skip=..                 - everything
//! GET /products/categories                       - category list
//! GET /products/{id}                             - one product
//! ```
//!
//! `sortBy`/`order` are appended to listing URLs only when both are set.

pub mod retry;

use std::sync::Arc;

use catalog_core::filters::{DEFAULT_LIMIT, DEFAULT_PAGE, IntParam, SortField, SortOrder};
use catalog_core::types::{Product, UpstreamListing};
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::UpstreamConfig;

pub use retry::RetryPolicy;

/// Errors that can occur when calling the upstream API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The configured user agent is not a valid header value.
    #[error("Invalid user agent: {0}")]
    UserAgent(#[from] InvalidHeaderValue),
}

// =============================================================================
// Listing Query
// =============================================================================

/// Resolved listing parameters, ready to be turned into an upstream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            sort: SortField::Unset,
            order: SortOrder::Unset,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListingQuery {
    /// Build from raw parameter values. Empty strings count as absent and
    /// non-numeric page/limit fall back to their defaults.
    #[must_use]
    pub fn from_raw(
        query: Option<&str>,
        category: Option<&str>,
        sort: Option<&str>,
        order: Option<&str>,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Self {
        let present = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(str::to_string);
        let number = |v: Option<&str>, default: i64| {
            v.filter(|s| !s.is_empty())
                .and_then(|s| IntParam::parse(s).value())
                .unwrap_or(default)
        };

        Self {
            query: present(query),
            category: present(category),
            sort: sort.and_then(SortField::parse).unwrap_or_default(),
            order: order.and_then(SortOrder::parse).unwrap_or_default(),
            page: number(page, DEFAULT_PAGE),
            limit: number(limit, DEFAULT_LIMIT),
        }
    }

    /// Offset of the first product on this page, never negative.
    #[must_use]
    pub const fn skip(&self) -> i64 {
        let skip = self.page.saturating_sub(1).saturating_mul(self.limit);
        if skip < 0 { 0 } else { skip }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the upstream product API.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<UpstreamClientInner>,
}

struct UpstreamClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Create a new upstream client.
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(UpstreamClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Fully-resolved listing URL. Doubles as the listing cache key.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path.
    pub fn listing_url(&self, query: &ListingQuery) -> Result<Url, UpstreamError> {
        let mut url = self.inner.base_url.join("/products")?;

        if let Some(q) = &query.query {
            url.set_path("/products/search");
            url.query_pairs_mut().append_pair("q", q);
        } else if let Some(category) = &query.category {
            url.set_path("/products/category");
            url.path_segments_mut()
                .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
                .push(category);
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            pairs.append_pair("skip", &query.skip().to_string());
            if !query.sort.is_unset() && !query.order.is_unset() {
                pairs.append_pair("sortBy", query.sort.as_str());
                pairs.append_pair("order", query.order.as_str());
            }
        }

        Ok(url)
    }

    /// One attempt at a listing URL.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or a body
    /// that is not a product listing.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_listing(&self, url: &Url) -> Result<UpstreamListing, UpstreamError> {
        self.get_json(url.clone()).await
    }

    /// The upstream category list, untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-success status.
    #[instrument(skip(self))]
    pub async fn fetch_categories(&self) -> Result<serde_json::Value, UpstreamError> {
        let url = self.categories_url()?;
        self.get_json(url).await
    }

    /// URL of the category list. Doubles as the category cache key.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be joined.
    pub fn categories_url(&self) -> Result<Url, UpstreamError> {
        Ok(self.inner.base_url.join("/products/categories")?)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Status` with 404 when the product is missing.
    #[instrument(skip(self))]
    pub async fn fetch_product(&self, id: u64) -> Result<Product, UpstreamError> {
        let url = self.inner.base_url.join(&format!("/products/{id}"))?;
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, UpstreamError> {
        let response = self.inner.client.get(url).send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            debug!(
                status = %status,
                body = %body.chars().take(200).collect::<String>(),
                "upstream returned non-success status"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
