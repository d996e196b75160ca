//! Product sources.
//!
//! [`ProductSource`] is the seam between [`crate::ProductQuery`] and the
//! network. [`HttpProductSource`] talks to the catalog proxy; tests supply
//! scripted sources.

use std::future::Future;

use catalog_core::fetch::FetchParams;
use catalog_core::types::{EnrichedProduct, ProductListing};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;

const USER_AGENT_VALUE: &str = concat!("catalog-client/", env!("CARGO_PKG_VERSION"));

/// Errors from fetching products.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request was superseded or torn down.
    #[error("Request cancelled")]
    Cancelled,

    /// The proxy answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("Invalid response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Whether this is a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status received, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Cancelled | Self::Parse(_) | Self::Url(_) => None,
        }
    }
}

/// Per-request knobs forwarded to the proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upstream attempt budget.
    pub retries: u32,
    /// Simulated latency in milliseconds.
    pub delay_ms: u64,
}

/// One product listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRequest {
    pub params: FetchParams,
    pub options: FetchOptions,
}

/// Anything that can produce a product listing.
pub trait ProductSource: Send + Sync + 'static {
    /// Fetch one listing page.
    ///
    /// Implementations should stop early and return [`FetchError::Cancelled`]
    /// when `cancel` fires. Callers must not rely on that alone: a result
    /// returned after cancellation is still discarded.
    fn fetch(
        &self,
        request: &ProductRequest,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<ProductListing, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the catalog proxy.
#[derive(Debug, Clone)]
pub struct HttpProductSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpProductSource {
    /// Create a source for the proxy at `config.proxy_base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(config.proxy_base_url.clone()),
        })
    }

    fn products_url(&self) -> Result<Url, FetchError> {
        Ok(self.base_url.join(PRODUCTS_PATH)?)
    }

    /// Detail URL for product `id`, below any path prefix of the proxy URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be joined.
    pub fn product_url(&self, id: u64) -> Result<Url, FetchError> {
        Ok(self.base_url.join(&format!("{PRODUCTS_PATH}/{id}"))?)
    }

    /// Listing URL for `request`, omitting unset and non-numeric values.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be joined.
    pub fn listing_url(&self, request: &ProductRequest) -> Result<Url, FetchError> {
        let mut url = self.products_url()?;
        {
            let params = &request.params;
            let mut pairs = url.query_pairs_mut();
            if let Some(q) = &params.query {
                pairs.append_pair("q", q);
            }
            if let Some(category) = &params.category {
                pairs.append_pair("category", category);
            }
            if !params.sort.is_unset() {
                pairs.append_pair("sort", params.sort.as_str());
            }
            if !params.order.is_unset() {
                pairs.append_pair("order", params.order.as_str());
            }
            if let Some(page) = params.page.value() {
                pairs.append_pair("page", &page.to_string());
            }
            if let Some(limit) = params.limit.value() {
                pairs.append_pair("limit", &limit.to_string());
            }
            if request.options.delay_ms > 0 {
                pairs.append_pair("delay", &request.options.delay_ms.to_string());
            }
            if request.options.retries > 0 {
                pairs.append_pair("retries", &request.options.retries.to_string());
            }
        }
        Ok(url)
    }

    /// Category list, passed through from upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the proxy rejects it.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<serde_json::Value, FetchError> {
        let mut url = self.products_url()?;
        url.query_pairs_mut().append_pair("action", "categories");

        let response = self.client.post(url).send().await?;
        Self::read_json(response).await
    }

    /// A single enriched product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the product does not exist.
    #[instrument(skip(self))]
    pub async fn product(&self, id: u64) -> Result<EnrichedProduct, FetchError> {
        let url = self.product_url(id)?;

        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn get_listing(&self, url: Url) -> Result<ProductListing, FetchError> {
        debug!(url = %url, "fetching products");
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl ProductSource for HttpProductSource {
    async fn fetch(
        &self,
        request: &ProductRequest,
        cancel: CancellationToken,
    ) -> Result<ProductListing, FetchError> {
        let url = self.listing_url(request)?;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.get_listing(url) => result,
        }
    }
}

/// Joined relative to the proxy base URL.
const PRODUCTS_PATH: &str = "api/products";

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalog_core::filters::{IntParam, SortField, SortOrder};

    fn source() -> HttpProductSource {
        HttpProductSource::new(&ClientConfig::new("http://127.0.0.1:3000").unwrap()).unwrap()
    }

    #[test]
    fn test_listing_url_includes_set_fields() {
        let request = ProductRequest {
            params: FetchParams {
                query: Some("red phone".to_string()),
                category: Some("smartphones".to_string()),
                sort: SortField::Price,
                order: SortOrder::Desc,
                page: IntParam::Value(2),
                limit: IntParam::Value(24),
            },
            options: FetchOptions {
                retries: 3,
                delay_ms: 500,
            },
        };

        let url = source().listing_url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:3000/api/products?q=red+phone&category=smartphones&sort=price&order=desc&page=2&limit=24&delay=500&retries=3"
        );
    }

    #[test]
    fn test_listing_url_omits_unset_fields() {
        let request = ProductRequest {
            params: FetchParams {
                page: IntParam::NotANumber,
                ..FetchParams::default()
            },
            options: FetchOptions::default(),
        };

        let url = source().listing_url(&request).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/api/products?limit=12");
    }

    #[test]
    fn test_urls_keep_proxy_path_prefix() {
        for base in ["https://shop.example.com/catalog", "https://shop.example.com/catalog/"] {
            let source = HttpProductSource::new(&ClientConfig::new(base).unwrap()).unwrap();
            let request = ProductRequest {
                params: FetchParams {
                    page: IntParam::NotANumber,
                    ..FetchParams::default()
                },
                options: FetchOptions::default(),
            };

            assert_eq!(
                source.listing_url(&request).unwrap().as_str(),
                "https://shop.example.com/catalog/api/products?limit=12"
            );
            assert_eq!(
                source.product_url(7).unwrap().as_str(),
                "https://shop.example.com/catalog/api/products/7"
            );
        }
    }

    #[test]
    fn test_status_code() {
        let err = FetchError::Status {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.status_code(), Some(500));
        assert!(!err.is_cancellation());
        assert_eq!(FetchError::Cancelled.status_code(), None);
        assert!(FetchError::Cancelled.is_cancellation());
    }

    #[tokio::test]
    async fn test_fetch_returns_cancelled_when_token_fired() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = ProductRequest {
            params: FetchParams::default(),
            options: FetchOptions::default(),
        };

        let result = source().fetch(&request, cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
