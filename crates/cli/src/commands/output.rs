//! Terminal rendering for query results.

#![allow(clippy::print_stdout)]

use catalog_client::QueryState;
use catalog_core::types::EnrichedProduct;

/// One product per line: id, title, display price, availability.
#[must_use]
pub fn product_line(product: &EnrichedProduct) -> String {
    format!(
        "{:>5}  {:<40}  {:>18}  {}",
        product.product.id, product.product.title, product.display_price, product.availability
    )
}

/// Pagination summary, e.g. `page 2 of 4 (100 products) [prev] [next]`.
#[must_use]
pub fn pagination_line(state: &QueryState) -> String {
    let p = &state.pagination;
    let mut line = format!(
        "page {} of {} ({} products)",
        p.current_page, p.total_pages, state.total
    );
    if p.has_previous_page {
        line.push_str(" [prev]");
    }
    if p.has_next_page {
        line.push_str(" [next]");
    }
    line
}

pub fn print_page(state: &QueryState) {
    if state.products.is_empty() {
        println!("no products");
    }
    for product in &state.products {
        println!("{}", product_line(product));
    }
    println!("{}", pagination_line(state));
}

pub fn print_location(query: &str) {
    if !query.is_empty() {
        println!("url: {query}");
    }
}

pub fn print_json(value: &serde_json::Value) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
