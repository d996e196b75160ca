//! Category list and product detail lookups.

use catalog_client::{ClientConfig, HttpProductSource};

use super::CommandError;
use super::output;

/// Print the upstream category list as returned by the proxy.
///
/// # Errors
///
/// Returns an error if the proxy URL is invalid or the request fails.
pub async fn categories(proxy: &str) -> Result<(), CommandError> {
    let source = HttpProductSource::new(&ClientConfig::new(proxy)?)?;
    let list = source.categories().await?;
    output::print_json(&list)?;
    Ok(())
}

/// Print one enriched product.
///
/// # Errors
///
/// Returns an error if the proxy URL is invalid or the product is missing.
pub async fn product(proxy: &str, id: u64) -> Result<(), CommandError> {
    let source = HttpProductSource::new(&ClientConfig::new(proxy)?)?;
    let product = source.product(id).await?;
    tracing::debug!(id, retrieved_at = %product.retrieved_at, "product fetched");
    output::print_json(&serde_json::to_value(&product)?)?;
    Ok(())
}
