//! Catalog client runtime.
//!
//! Everything the browsing UI needs between user input and the proxy:
//!
//! - [`store`] - Filter state store with change subscriptions
//! - [`url_sync`] - Address bar synchronization (inbound once, outbound on change)
//! - [`debounce`] - Debounced free-text input
//! - [`source`] - Product sources, including the HTTP source for the proxy
//! - [`query`] - Product query with fetch caching and supersession
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use catalog_client::{FilterStore, HttpProductSource, ProductQuery, fetch_cache};
//!
//! let store = FilterStore::new();
//! let source = HttpProductSource::new(&config)?;
//! let query = ProductQuery::new(source, Arc::new(fetch_cache()), config.fetch_options());
//!
//! store.initialize_from(catalog_core::filters::decode_from_external("?q=phone"));
//! if let Some(fetch) = query.sync(&store.state()) {
//!     fetch.await?;
//! }
//! println!("{} products", query.state().total);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod debounce;
pub mod query;
pub mod source;
pub mod store;
pub mod url_sync;

pub use config::ClientConfig;
pub use debounce::Debouncer;
pub use query::{
    ApiError, FETCH_CACHE_TTL, FetchCache, FetchStatus, ProductPage, ProductQuery, QueryState,
    fetch_cache,
};
pub use source::{FetchError, FetchOptions, HttpProductSource, ProductRequest, ProductSource};
pub use store::FilterStore;
pub use url_sync::{FilterSession, Location, MemoryLocation, UrlSynchronizer};
