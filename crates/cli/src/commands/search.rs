//! One-shot product search.
//!
//! The starting state comes from `--url` exactly as the address bar would
//! supply it. Flags are then dispatched as filter actions, so they reset the
//! page the same way UI controls do. An explicit `--page` is applied last.

use std::sync::Arc;

use catalog_client::{
    ClientConfig, FetchStatus, FilterSession, HttpProductSource, Location, MemoryLocation,
    ProductQuery, QueryState, fetch_cache,
};
use catalog_core::filters::{FilterAction, IntParam, SortField, SortOrder};
use clap::Args;

use super::CommandError;
use super::output;

#[derive(Debug, Default, Args)]
pub struct SearchArgs {
    /// Starting query string, e.g. `?q=phone&page=2`
    #[arg(long, default_value = "")]
    pub url: String,

    /// Free-text search term
    #[arg(long)]
    pub q: Option<String>,

    /// Category slug (`all` for every category)
    #[arg(long)]
    pub category: Option<String>,

    /// Sort field
    #[arg(long, value_parser = ["price", "rating", "title"])]
    pub sort: Option<String>,

    /// Sort direction
    #[arg(long, value_parser = ["asc", "desc"])]
    pub order: Option<String>,

    /// Page number
    #[arg(long)]
    pub page: Option<String>,

    /// Page size
    #[arg(long)]
    pub limit: Option<String>,

    /// Upstream attempt budget on the proxy
    #[arg(long, default_value_t = 0)]
    pub retries: u32,

    /// Simulated proxy latency in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay: u64,
}

impl SearchArgs {
    /// Filter actions for the flags that were given, in dispatch order.
    #[must_use]
    pub fn actions(&self) -> Vec<FilterAction> {
        let mut actions = Vec::new();
        if let Some(q) = &self.q {
            actions.push(FilterAction::SetQuery(q.clone()));
        }
        if let Some(category) = &self.category {
            actions.push(FilterAction::SetCategory(category.clone()));
        }
        if let Some(sort) = self.sort.as_deref().and_then(SortField::parse) {
            actions.push(FilterAction::SetSort(sort));
        }
        if let Some(order) = self.order.as_deref().and_then(SortOrder::parse) {
            actions.push(FilterAction::SetOrder(order));
        }
        if let Some(limit) = &self.limit {
            actions.push(FilterAction::SetLimit(IntParam::parse(limit)));
        }
        if let Some(page) = &self.page {
            actions.push(FilterAction::SetPage(IntParam::parse(page)));
        }
        actions
    }
}

/// Run a search and print the resulting page.
///
/// # Errors
///
/// Returns an error if the proxy URL is invalid or the fetch fails.
pub async fn run(proxy: &str, args: SearchArgs) -> Result<(), CommandError> {
    let mut config = ClientConfig::new(proxy)?;
    config.retries = args.retries;
    config.delay_ms = args.delay;

    let session = FilterSession::new(MemoryLocation::new(args.url.clone()));
    let mut state = session.start();
    for action in args.actions() {
        state = session.dispatch(action);
    }
    tracing::debug!(?state, "filters resolved");

    let query = ProductQuery::new(
        HttpProductSource::new(&config)?,
        Arc::new(fetch_cache()),
        config.fetch_options(),
    );
    if let Some(fetch) = query.sync(&state) {
        fetch.await?;
    }
    let result = query.state();
    query.shutdown();

    output::print_location(&session.location().query());
    finish(&result)
}

fn finish(result: &QueryState) -> Result<(), CommandError> {
    match (&result.status, &result.error) {
        (FetchStatus::Failed, Some(error)) => Err(CommandError::Failed(error.clone())),
        _ => {
            output::print_page(result);
            Ok(())
        }
    }
}
