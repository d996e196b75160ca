//! Core types for the catalog.
//!
//! This module provides the product model shared by the proxy and the client.

pub mod price;
pub mod product;
pub mod status;

pub use price::{CurrencyCode, DEFAULT_EXCHANGE_RATE, Price, PriceFormat};
pub use product::{EnrichedProduct, Listing, Product, ProductListing, UpstreamListing};
pub use status::Availability;
