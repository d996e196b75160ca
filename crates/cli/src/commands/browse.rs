//! Interactive browsing: each stdin line is a keystroke-level search term.
//!
//! Terms go through the debouncer, settled terms are dispatched through the
//! filter session (which keeps the URL current), and the product query follows
//! the store. Results print whenever a fetch settles.

use std::sync::Arc;
use std::time::Duration;

use catalog_client::{
    ClientConfig, Debouncer, FetchStatus, FilterSession, HttpProductSource, Location,
    MemoryLocation, ProductQuery, QueryState, fetch_cache,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use super::CommandError;
use super::output;

/// Run the interactive loop until stdin closes.
///
/// # Errors
///
/// Returns an error if the proxy URL is invalid or stdin cannot be read.
pub async fn run(
    proxy: &str,
    url: &str,
    debounce_ms: u64,
    min_length: usize,
) -> Result<(), CommandError> {
    let mut config = ClientConfig::new(proxy)?;
    config.debounce_delay = Duration::from_millis(debounce_ms);
    config.min_query_length = min_length;

    let session = Arc::new(FilterSession::new(MemoryLocation::new(url)));
    let initial = session.start();
    let store = session.store().clone();

    let debouncer = Debouncer::new(initial.query.clone().unwrap_or_default(), config.debounce_delay)
        .with_min_length(config.min_query_length);
    let forward = {
        let session = Arc::clone(&session);
        let settled = debouncer.subscribe();
        tokio::spawn(async move { session.forward_settled_queries(settled).await })
    };

    let query = Arc::new(ProductQuery::new(
        HttpProductSource::new(&config)?,
        Arc::new(fetch_cache()),
        config.fetch_options(),
    ));
    let follower = {
        let query = Arc::clone(&query);
        let filters = store.subscribe();
        tokio::spawn(async move { query.follow(filters).await })
    };
    let printer = tokio::spawn(print_settled(Arc::clone(&session), query.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        debouncer.update(line.trim());
    }

    // Let the last term settle before tearing down
    tokio::time::sleep(config.debounce_delay).await;
    drop(debouncer);
    forward.await?;
    follower.abort();
    query.shutdown();
    printer.abort();
    Ok(())
}

async fn print_settled(
    session: Arc<FilterSession<MemoryLocation>>,
    mut states: watch::Receiver<QueryState>,
) {
    while states.changed().await.is_ok() {
        let state = states.borrow_and_update().clone();
        match state.status {
            FetchStatus::Succeeded => {
                output::print_location(&session.location().query());
                output::print_page(&state);
            }
            FetchStatus::Failed => {
                if let Some(error) = &state.error {
                    tracing::warn!(
                        status = error.status_code,
                        message = %error.message,
                        "fetch failed"
                    );
                }
            }
            FetchStatus::Idle | FetchStatus::Loading => {}
        }
    }
}
