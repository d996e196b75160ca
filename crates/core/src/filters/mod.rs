//! Search, filter and pagination state.
//!
//! [`FilterState`] is only ever changed through [`reduce`], which applies one
//! [`FilterAction`] and returns the next state. Two rules hold for every
//! action sequence:
//!
//! - Changing `query`, `category`, `sort`, `order` or `limit` puts `page`
//!   back to 1. `SetPage` is the only action that writes `page` directly.
//! - `initialized` goes from `false` to `true` once and never reverts.

pub mod query_string;

use std::fmt;

use serde::{Serialize, Serializer};

pub use query_string::{decode_from_external, decode_state, encode_to_external};

/// Category sentinel meaning "no category filter".
pub const ALL_CATEGORIES: &str = "all";

/// Page shown when nothing else is requested.
pub const DEFAULT_PAGE: i64 = 1;

/// Page size shown when nothing else is requested.
pub const DEFAULT_LIMIT: i64 = 12;

// =============================================================================
// Field Types
// =============================================================================

/// Field products are sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortField {
    /// Upstream default ordering (`"none"`).
    #[default]
    Unset,
    Price,
    Rating,
    Title,
}

impl SortField {
    /// Parse from URL parameter value. Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::Unset),
            "price" => Some(Self::Price),
            "rating" => Some(Self::Rating),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    /// Convert to URL parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "none",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::Title => "title",
        }
    }

    /// Whether this is the `"none"` sentinel.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// No direction requested (`"none"`).
    #[default]
    Unset,
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse from URL parameter value. Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::Unset),
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    /// Convert to URL parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "none",
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// Whether this is the `"none"` sentinel.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// An integer that came from an untrusted text source.
///
/// Text that does not start with a number is kept as [`IntParam::NotANumber`]
/// instead of being replaced by a default, so a malformed `page=abc` stays
/// visible in state rather than silently turning into page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntParam {
    Value(i64),
    NotANumber,
}

impl IntParam {
    /// Parse the leading integer of `raw`, browser `parseInt` style.
    ///
    /// Leading whitespace and a sign are accepted, trailing garbage is
    /// ignored (`"3abc"` is 3). No leading digits gives `NotANumber`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_start();
        let (negative, rest) = trimmed.strip_prefix('-').map_or_else(
            || (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
            |rest| (true, rest),
        );
        let digits = rest
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap_or_default();
        if digits.is_empty() {
            return Self::NotANumber;
        }

        digits
            .parse::<i64>()
            .map_or(Self::NotANumber, |n| Self::Value(if negative { -n } else { n }))
    }

    /// The numeric value, if any.
    #[must_use]
    pub const fn value(self) -> Option<i64> {
        match self {
            Self::Value(n) => Some(n),
            Self::NotANumber => None,
        }
    }
}

impl From<u32> for IntParam {
    fn from(n: u32) -> Self {
        Self::Value(i64::from(n))
    }
}

impl From<i64> for IntParam {
    fn from(n: i64) -> Self {
        Self::Value(n)
    }
}

impl fmt::Display for IntParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(n) => write!(f, "{n}"),
            Self::NotANumber => f.write_str("NaN"),
        }
    }
}

impl Serialize for IntParam {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(n) => serializer.serialize_i64(*n),
            Self::NotANumber => serializer.serialize_none(),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Canonical search/filter/pagination state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    /// Free-text search term.
    pub query: Option<String>,
    /// Category slug or [`ALL_CATEGORIES`].
    pub category: String,
    pub sort: SortField,
    pub order: SortOrder,
    /// 1-based page number.
    pub page: IntParam,
    /// Page size.
    pub limit: IntParam,
    /// Set once the state has been reconciled with the external URL.
    pub initialized: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            query: None,
            category: ALL_CATEGORIES.to_string(),
            sort: SortField::Unset,
            order: SortOrder::Unset,
            page: IntParam::Value(DEFAULT_PAGE),
            limit: IntParam::Value(DEFAULT_LIMIT),
            initialized: false,
        }
    }
}

impl FilterState {
    /// Non-empty search term, if any.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    /// Category slug unless it is the "all" sentinel.
    #[must_use]
    pub fn category_filter(&self) -> Option<&str> {
        Some(self.category.as_str()).filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }
}

/// Partial state coming from outside (the URL). `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    pub query: Option<String>,
    pub category: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    pub page: Option<IntParam>,
    pub limit: Option<IntParam>,
}

/// A discrete update to [`FilterState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    SetQuery(String),
    SetCategory(String),
    SetSort(SortField),
    SetOrder(SortOrder),
    SetPage(IntParam),
    SetLimit(IntParam),
    /// Restore every field to its default, keeping `initialized`.
    Reset,
    /// Merge external values over the defaults and mark initialized.
    InitializeFrom(FilterPatch),
}

/// Apply `action` to `state`, returning the next state.
#[must_use]
pub fn reduce(state: &FilterState, action: FilterAction) -> FilterState {
    let first_page = IntParam::Value(DEFAULT_PAGE);

    match action {
        FilterAction::SetQuery(query) => FilterState {
            query: Some(query),
            page: first_page,
            ..state.clone()
        },
        FilterAction::SetCategory(category) => FilterState {
            category,
            page: first_page,
            ..state.clone()
        },
        FilterAction::SetSort(sort) => FilterState {
            sort,
            page: first_page,
            ..state.clone()
        },
        FilterAction::SetOrder(order) => FilterState {
            order,
            page: first_page,
            ..state.clone()
        },
        FilterAction::SetPage(page) => FilterState {
            page,
            ..state.clone()
        },
        FilterAction::SetLimit(limit) => FilterState {
            limit,
            page: first_page,
            ..state.clone()
        },
        FilterAction::Reset => FilterState {
            initialized: true,
            ..FilterState::default()
        },
        FilterAction::InitializeFrom(patch) => {
            let defaults = FilterState::default();
            FilterState {
                query: patch.query.or(defaults.query),
                category: patch.category.unwrap_or(defaults.category),
                sort: patch.sort.unwrap_or(defaults.sort),
                order: patch.order.unwrap_or(defaults.order),
                page: patch.page.unwrap_or(defaults.page),
                limit: patch.limit.unwrap_or(defaults.limit),
                initialized: true,
            }
        }
    }
}
