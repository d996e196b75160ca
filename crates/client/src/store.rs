//! Filter state store.
//!
//! One store is created per browsing session and handed to every consumer.
//! Updates go through [`FilterStore::dispatch`], which runs the reducer and
//! notifies subscribers only when the state actually changed.

use std::sync::Arc;

use catalog_core::filters::{
    FilterAction, FilterPatch, FilterState, IntParam, SortField, SortOrder, reduce,
};
use tokio::sync::watch;
use tracing::debug;

/// Owner of the canonical [`FilterState`].
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct FilterStore {
    tx: Arc<watch::Sender<FilterState>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStore {
    /// Create a store holding the default, uninitialized state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(FilterState::default())
    }

    /// Create a store holding `state`.
    #[must_use]
    pub fn with_state(state: FilterState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> FilterState {
        self.tx.borrow().clone()
    }

    /// Receive every committed state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FilterState> {
        self.tx.subscribe()
    }

    /// Apply one action. Returns `true` if the state changed.
    pub fn dispatch(&self, action: FilterAction) -> bool {
        debug!(?action, "filter action");
        self.tx.send_if_modified(|state| {
            let next = reduce(state, action);
            if next == *state {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Reconcile with external (URL) values, once.
    ///
    /// Returns `false` without touching state if the store is already
    /// initialized, so later calls cannot clobber user changes.
    pub fn initialize_from(&self, patch: FilterPatch) -> bool {
        if self.tx.borrow().initialized {
            return false;
        }
        self.dispatch(FilterAction::InitializeFrom(patch));
        true
    }

    pub fn set_query(&self, query: impl Into<String>) -> bool {
        self.dispatch(FilterAction::SetQuery(query.into()))
    }

    pub fn set_category(&self, category: impl Into<String>) -> bool {
        self.dispatch(FilterAction::SetCategory(category.into()))
    }

    pub fn set_sort(&self, sort: SortField) -> bool {
        self.dispatch(FilterAction::SetSort(sort))
    }

    pub fn set_order(&self, order: SortOrder) -> bool {
        self.dispatch(FilterAction::SetOrder(order))
    }

    pub fn set_page(&self, page: impl Into<IntParam>) -> bool {
        self.dispatch(FilterAction::SetPage(page.into()))
    }

    pub fn set_limit(&self, limit: impl Into<IntParam>) -> bool {
        self.dispatch(FilterAction::SetLimit(limit.into()))
    }

    pub fn reset(&self) -> bool {
        self.dispatch(FilterAction::Reset)
    }
}
