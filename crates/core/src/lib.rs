//! Catalog Core - Shared types and pure state logic.
//!
//! This crate provides the pieces used by every catalog component:
//! - `proxy` - Server-side proxy/transform endpoint
//! - `client` - Client-side filter store, debounced input and product query
//! - `cli` - Command-line host driving the client against a running proxy
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure functions - no I/O,
//! no HTTP clients, no async runtime. Everything here can be tested
//! deterministically and used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Products, listings, prices and stock availability
//! - [`filters`] - Filter state, reducer actions and the URL query codec
//! - [`fetch`] - Fetch parameters, fingerprints and pagination facts
//! - [`cache`] - Clock abstraction and a lazily-expiring TTL cache

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod fetch;
pub mod filters;
pub mod types;

pub use cache::{CacheEntry, Clock, ManualClock, SystemClock, TtlCache};
pub use fetch::{FetchParams, Fingerprint, Pagination};
pub use filters::{FilterAction, FilterPatch, FilterState, IntParam, SortField, SortOrder};
pub use types::*;
