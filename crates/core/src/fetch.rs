//! Fetch parameters derived from filter state.
//!
//! A [`Fingerprint`] identifies the result set a fetch produces. Two
//! parameter sets with the same fingerprint are the same logical request,
//! for caching and for deciding whether an in-flight fetch is superseded.

use std::fmt;

use serde_json::json;

use crate::filters::{FilterState, IntParam, SortField, SortOrder};

/// The six fields that determine a product result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchParams {
    pub query: Option<String>,
    pub category: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: IntParam,
    pub limit: IntParam,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self::from_filters(&FilterState::default())
    }
}

impl FetchParams {
    /// Derive fetch parameters from filter state.
    ///
    /// An empty search term and the `"all"` category both mean "no filter".
    #[must_use]
    pub fn from_filters(state: &FilterState) -> Self {
        Self {
            query: state.search_term().map(str::to_string),
            category: state.category_filter().map(str::to_string),
            sort: state.sort,
            order: state.order,
            page: state.page,
            limit: state.limit,
        }
    }

    /// Deterministic identity of this request.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let sort = (!self.sort.is_unset()).then(|| self.sort.as_str());
        let order = (!self.order.is_unset()).then(|| self.order.as_str());

        // serde_json objects keep keys sorted, so field order never matters
        let value = json!({
            "q": self.query,
            "category": self.category,
            "sort": sort,
            "order": order,
            "page": self.page,
            "limit": self.limit,
        });
        Fingerprint(value.to_string())
    }
}

/// Cache key and supersession token for one logical fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The serialized form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pagination facts derived from a total count and the requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: IntParam,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl Pagination {
    /// `total_pages = ceil(total / limit)`. A non-numeric or non-positive
    /// limit yields zero pages, and a non-numeric page has no neighbours.
    #[must_use]
    pub fn derive(total: u64, page: IntParam, limit: IntParam) -> Self {
        let total_pages = limit
            .value()
            .and_then(|l| u64::try_from(l).ok())
            .filter(|l| *l > 0)
            .map_or(0, |l| total.div_ceil(l));
        let page_number = page.value();

        Self {
            current_page: page,
            total_pages,
            has_next_page: page_number.is_some_and(|p| i128::from(p) < i128::from(total_pages)),
            has_previous_page: page_number.is_some_and(|p| p > 1),
        }
    }
}
