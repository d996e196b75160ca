//! Address bar synchronization.
//!
//! The host's routing layer implements [`Location`]. [`UrlSynchronizer`]
//! reads it once on load and writes it back after every committed change,
//! always replacing in place so no history entries are created.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use catalog_core::filters::{FilterAction, FilterState, decode_from_external, encode_to_external};
use tokio::sync::watch;
use tracing::debug;

use crate::store::FilterStore;

/// The externally visible query string.
pub trait Location: Send + Sync {
    /// Current query string, with or without a leading `?`.
    fn query(&self) -> String;

    /// Replace the query string in place, without a history entry.
    fn replace_query(&self, query: &str);
}

/// In-process location for CLIs and tests.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    query: Mutex<String>,
    replacements: AtomicUsize,
}

impl MemoryLocation {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Mutex::new(query.into()),
            replacements: AtomicUsize::new(0),
        }
    }

    /// How many times the query string has been replaced.
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::Relaxed)
    }
}

impl Location for MemoryLocation {
    fn query(&self) -> String {
        self.query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_query(&self, query: &str) {
        *self.query.lock().unwrap_or_else(PoisonError::into_inner) = query.to_string();
        self.replacements.fetch_add(1, Ordering::Relaxed);
    }
}

/// Two one-directional effects between a [`Location`] and a [`FilterStore`].
#[derive(Debug)]
pub struct UrlSynchronizer<L> {
    location: L,
}

impl<L: Location> UrlSynchronizer<L> {
    pub const fn new(location: L) -> Self {
        Self { location }
    }

    pub const fn location(&self) -> &L {
        &self.location
    }

    /// Load the location into the store. Only the first call has an effect.
    pub fn inbound(&self, store: &FilterStore) -> bool {
        let query = self.location.query();
        let applied = store.initialize_from(decode_from_external(&query));
        if applied {
            debug!(query = %query, "filters initialized from location");
        }
        applied
    }

    /// Write `state` to the location if its encoding differs.
    ///
    /// Does nothing before the store has been initialized, so default state
    /// never overwrites the incoming URL.
    pub fn outbound(&self, state: &FilterState) -> bool {
        if !state.initialized {
            return false;
        }

        let encoded = encode_to_external(state);
        let current = self.location.query();
        if current.strip_prefix('?').unwrap_or(&current) == encoded {
            return false;
        }

        debug!(query = %encoded, "location updated");
        self.location.replace_query(&encoded);
        true
    }
}

/// A filter store wired to a location.
///
/// Every dispatch is followed by the outbound step, so the location always
/// reflects the most recently reduced state.
#[derive(Debug)]
pub struct FilterSession<L> {
    store: FilterStore,
    sync: UrlSynchronizer<L>,
}

impl<L: Location> FilterSession<L> {
    pub fn new(location: L) -> Self {
        Self::with_store(FilterStore::new(), location)
    }

    pub const fn with_store(store: FilterStore, location: L) -> Self {
        Self {
            store,
            sync: UrlSynchronizer::new(location),
        }
    }

    /// Run the inbound step. Call once, before accepting input.
    pub fn start(&self) -> FilterState {
        self.sync.inbound(&self.store);
        self.store.state()
    }

    /// Apply `action` and mirror the result to the location.
    pub fn dispatch(&self, action: FilterAction) -> FilterState {
        self.store.dispatch(action);
        let state = self.store.state();
        self.sync.outbound(&state);
        state
    }

    /// Dispatch each settled search input until the input side closes.
    ///
    /// Pair with [`crate::Debouncer::subscribe`] so only settled text reaches
    /// the filter state. Each change resets the page and is mirrored to the
    /// location.
    pub async fn forward_settled_queries(&self, mut settled: watch::Receiver<String>) {
        while settled.changed().await.is_ok() {
            let query = settled.borrow_and_update().clone();
            self.dispatch(FilterAction::SetQuery(query));
        }
    }

    pub const fn store(&self) -> &FilterStore {
        &self.store
    }

    pub const fn location(&self) -> &L {
        self.sync.location()
    }
}
