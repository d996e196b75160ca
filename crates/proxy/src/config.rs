//! Proxy configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `PROXY_HOST` - Bind address (default: 127.0.0.1)
//! - `PROXY_PORT` - Listen port (default: 3000)
//! - `UPSTREAM_BASE_URL` - Product API origin (default: <https://dummyjson.com>)
//! - `UPSTREAM_USER_AGENT` - User agent sent upstream (default: Ecommerce-App/1.0)
//! - `UPSTREAM_TIMEOUT_SECS` - Per-attempt timeout (default: 10)
//! - `RETRY_BACKOFF_BASE_MS` - First backoff sleep, doubled per attempt (default: 1000)
//! - `MAX_RETRIES` - Cap on the caller-supplied attempt budget (default: 5)
//! - `MAX_SIMULATED_DELAY_MS` - Cap on the `delay` parameter (default: 5000)
//! - `LISTING_CACHE_TTL_SECS` - Listing and product cache lifetime (default: 300)
//! - `CATEGORY_CACHE_TTL_SECS` - Category list cache lifetime (default: 3600)
//! - `CACHE_MAX_CAPACITY` - Entries per cache (default: 10000)
//! - `DISPLAY_CURRENCY` - ISO code for display prices (default: MXN)
//! - `PRICE_EXCHANGE_RATE` - Multiplier applied to upstream prices (default: 19.5)
//! - `TRUST_PROXY_HEADERS` - Key rate limits on `X-Forwarded-For`/`X-Real-IP`.
//!   Only enable behind a reverse proxy that overwrites them (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use catalog_core::types::{CurrencyCode, DEFAULT_EXCHANGE_RATE, PriceFormat};
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://dummyjson.com";
pub const DEFAULT_USER_AGENT: &str = "Ecommerce-App/1.0";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Proxy application configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Upstream product API
    pub upstream: UpstreamConfig,
    /// Retry and backoff policy
    pub retry: RetryConfig,
    /// Upper bound for the simulated `delay` parameter
    pub max_simulated_delay: Duration,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Display price currency and exchange rate
    pub price_format: PriceFormat,
    /// Whether client IP headers come from a trusted reverse proxy
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Upstream product API settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Retry policy for upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Sleep before the second attempt. Doubles each time after that.
    pub backoff_base: Duration,
    /// Hard cap on attempts per request.
    pub max_attempts: u32,
}

/// Response cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub listing_ttl: Duration,
    pub category_ttl: Duration,
    pub max_capacity: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listing_ttl: Duration::from_secs(300),
            category_ttl: Duration::from_secs(3600),
            max_capacity: 10_000,
        }
    }
}

impl ProxyConfig {
    /// Defaults for everything except the upstream origin.
    #[must_use]
    pub fn with_upstream(base_url: Url) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            upstream: UpstreamConfig {
                base_url,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                timeout: Duration::from_secs(10),
            },
            retry: RetryConfig::default(),
            max_simulated_delay: Duration::from_millis(5000),
            cache: CacheConfig::default(),
            price_format: PriceFormat::default(),
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to a value that does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = get_env_or_default("UPSTREAM_BASE_URL", DEFAULT_UPSTREAM_BASE_URL);
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("UPSTREAM_BASE_URL".to_string(), e.to_string())
        })?;

        let max_attempts: u32 = get_parsed_env("MAX_RETRIES", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: get_parsed_env("PROXY_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: get_parsed_env("PROXY_PORT", 3000)?,
            upstream: UpstreamConfig {
                base_url,
                user_agent: get_env_or_default("UPSTREAM_USER_AGENT", DEFAULT_USER_AGENT),
                timeout: Duration::from_secs(get_parsed_env("UPSTREAM_TIMEOUT_SECS", 10)?),
            },
            retry: RetryConfig {
                backoff_base: Duration::from_millis(get_parsed_env("RETRY_BACKOFF_BASE_MS", 1000)?),
                max_attempts,
            },
            max_simulated_delay: Duration::from_millis(get_parsed_env(
                "MAX_SIMULATED_DELAY_MS",
                5000,
            )?),
            cache: CacheConfig {
                listing_ttl: Duration::from_secs(get_parsed_env("LISTING_CACHE_TTL_SECS", 300)?),
                category_ttl: Duration::from_secs(get_parsed_env("CATEGORY_CACHE_TTL_SECS", 3600)?),
                max_capacity: get_parsed_env("CACHE_MAX_CAPACITY", 10_000)?,
            },
            price_format: PriceFormat {
                currency: get_parsed_env("DISPLAY_CURRENCY", CurrencyCode::MXN)?,
                exchange_rate: get_parsed_env("PRICE_EXCHANGE_RATE", DEFAULT_EXCHANGE_RATE)?,
            },
            trust_proxy_headers: get_parsed_env("TRUST_PROXY_HEADERS", false)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_env_value(key, &raw))
}

fn parse_env_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
