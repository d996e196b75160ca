//! Product and listing types.
//!
//! [`Product`] mirrors the upstream record. Fields this crate does not model
//! are kept in [`Product::extra`] so the proxy passes them through untouched.
//! [`EnrichedProduct`] adds the three fields derived at transformation time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::price::PriceFormat;
use super::status::Availability;

/// A product as received from the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Upstream product ID.
    pub id: u64,
    /// Product title.
    pub title: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Price in the upstream currency.
    pub price: f64,
    /// Discount percentage advertised upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    /// Average rating (0-5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Units in stock.
    #[serde(default)]
    pub stock: i64,
    /// Brand name, absent for unbranded goods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Category slug.
    #[serde(default)]
    pub category: String,
    /// Thumbnail image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Gallery image URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Upstream fields not modelled above (tags, reviews, dimensions, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Product {
    /// Attach the derived display fields.
    #[must_use]
    pub fn enrich(self, format: &PriceFormat, retrieved_at: DateTime<Utc>) -> EnrichedProduct {
        EnrichedProduct {
            display_price: format.format(self.price),
            availability: Availability::from_stock(self.stock),
            retrieved_at,
            product: self,
        }
    }
}

/// A product with the fields derived by the proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedProduct {
    /// The upstream record, flattened into the same JSON object.
    #[serde(flatten)]
    pub product: Product,
    /// Currency-formatted price (e.g., "$1,249.00 MXN").
    pub display_price: String,
    /// Availability derived from the stock count.
    pub availability: Availability,
    /// When the record was transformed.
    pub retrieved_at: DateTime<Utc>,
}

/// One page of products with upstream pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<P> {
    /// Products on this page, in upstream order.
    pub products: Vec<P>,
    /// Total number of matching products across all pages.
    pub total: u64,
    /// Offset of the first product on this page.
    #[serde(default)]
    pub skip: u64,
    /// Page size used upstream.
    #[serde(default)]
    pub limit: u64,
}

/// Listing as returned by the upstream API.
pub type UpstreamListing = Listing<Product>;

/// Listing as returned by the proxy to clients.
pub type ProductListing = Listing<EnrichedProduct>;

impl UpstreamListing {
    /// Enrich every product, keeping order and pagination metadata.
    #[must_use]
    pub fn enrich(self, format: &PriceFormat, retrieved_at: DateTime<Utc>) -> ProductListing {
        Listing {
            products: self
                .products
                .into_iter()
                .map(|product| product.enrich(format, retrieved_at))
                .collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}
