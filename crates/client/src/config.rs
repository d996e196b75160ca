//! Client configuration.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::source::FetchOptions;

/// Default debounce delay for free-text input.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// Default timeout for a single proxy request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid proxy URL {0}: {1}")]
    InvalidProxyUrl(String, url::ParseError),
    #[error("Proxy URL must be http or https: {0}")]
    UnsupportedScheme(String),
}

/// Settings for talking to the catalog proxy.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy origin, e.g. `http://127.0.0.1:3000`.
    pub proxy_base_url: Url,
    /// Quiet period before typed input is committed.
    pub debounce_delay: Duration,
    /// Inputs shorter than this commit without waiting.
    pub min_query_length: usize,
    /// Upstream attempt budget forwarded to the proxy.
    pub retries: u32,
    /// Simulated latency forwarded to the proxy, in milliseconds.
    pub delay_ms: u64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the proxy URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or is not http(s).
    pub fn new(proxy_base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(proxy_base_url)
            .map_err(|e| ConfigError::InvalidProxyUrl(proxy_base_url.to_string(), e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(proxy_base_url.to_string()));
        }

        Ok(Self {
            proxy_base_url: url,
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            min_query_length: 0,
            retries: 0,
            delay_ms: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Per-request options handed to product sources.
    #[must_use]
    pub const fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            retries: self.retries,
            delay_ms: self.delay_ms,
        }
    }
}
