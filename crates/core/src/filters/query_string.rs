//! Mapping between [`FilterState`] and the address bar query string.
//!
//! Recognized keys, in serialization order: `q`, `category`, `sort`, `order`,
//! `page`, `limit`. A field at its default value is never written, so the
//! default state encodes to an empty string.

use url::form_urlencoded;

use super::{
    ALL_CATEGORIES, DEFAULT_LIMIT, FilterAction, FilterPatch, FilterState, IntParam, SortField,
    SortOrder, reduce,
};

pub const KEY_QUERY: &str = "q";
pub const KEY_CATEGORY: &str = "category";
pub const KEY_SORT: &str = "sort";
pub const KEY_ORDER: &str = "order";
pub const KEY_PAGE: &str = "page";
pub const KEY_LIMIT: &str = "limit";

/// Parse an external query string into the fields it sets.
///
/// A leading `?` is accepted. For repeated keys the first value wins. Empty
/// values count as absent. Unknown `sort`/`order` values are ignored, while
/// non-numeric `page`/`limit` values are kept as [`IntParam::NotANumber`].
#[must_use]
pub fn decode_from_external(query: &str) -> FilterPatch {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut patch = FilterPatch::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            KEY_QUERY if patch.query.is_none() => patch.query = Some(value.into_owned()),
            KEY_CATEGORY if patch.category.is_none() => {
                patch.category = Some(value.into_owned());
            }
            KEY_SORT if patch.sort.is_none() => patch.sort = SortField::parse(&value),
            KEY_ORDER if patch.order.is_none() => patch.order = SortOrder::parse(&value),
            KEY_PAGE if patch.page.is_none() => patch.page = Some(IntParam::parse(&value)),
            KEY_LIMIT if patch.limit.is_none() => patch.limit = Some(IntParam::parse(&value)),
            _ => {}
        }
    }

    patch
}

/// Decode a query string straight into an initialized [`FilterState`].
#[must_use]
pub fn decode_state(query: &str) -> FilterState {
    reduce(
        &FilterState::default(),
        FilterAction::InitializeFrom(decode_from_external(query)),
    )
}

/// Serialize state to a query string (no leading `?`), omitting defaults.
#[must_use]
pub fn encode_to_external(state: &FilterState) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    if let Some(q) = state.search_term() {
        serializer.append_pair(KEY_QUERY, q);
    }
    if !state.category.is_empty() && state.category != ALL_CATEGORIES {
        serializer.append_pair(KEY_CATEGORY, &state.category);
    }
    if !state.sort.is_unset() {
        serializer.append_pair(KEY_SORT, state.sort.as_str());
    }
    if !state.order.is_unset() {
        serializer.append_pair(KEY_ORDER, state.order.as_str());
    }
    if let Some(page) = state.page.value().filter(|p| *p > 1) {
        serializer.append_pair(KEY_PAGE, &page.to_string());
    }
    if let Some(limit) = state.limit.value().filter(|l| *l != 0 && *l != DEFAULT_LIMIT) {
        serializer.append_pair(KEY_LIMIT, &limit.to_string());
    }

    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_encodes_empty() {
        assert_eq!(encode_to_external(&FilterState::default()), "");
    }

    #[test]
    fn test_encode_fixed_key_order() {
        let state = FilterState {
            query: Some("iphone".to_string()),
            category: "smartphones".to_string(),
            sort: SortField::Price,
            order: SortOrder::Asc,
            page: IntParam::Value(2),
            limit: IntParam::Value(24),
            initialized: true,
        };

        assert_eq!(
            encode_to_external(&state),
            "q=iphone&category=smartphones&sort=price&order=asc&page=2&limit=24"
        );
    }

    #[test]
    fn test_encode_escapes_values() {
        let state = FilterState {
            query: Some("red & blue".to_string()),
            ..FilterState::default()
        };
        assert_eq!(encode_to_external(&state), "q=red+%26+blue");
    }

    #[test]
    fn test_encode_omits_not_a_number() {
        let state = FilterState {
            page: IntParam::NotANumber,
            limit: IntParam::NotANumber,
            ..FilterState::default()
        };
        assert_eq!(encode_to_external(&state), "");
    }

    #[test]
    fn test_decode_recognized_keys() {
        let patch =
            decode_from_external("?q=laptop&category=laptops&sort=rating&order=desc&page=3&limit=6");

        assert_eq!(patch.query.as_deref(), Some("laptop"));
        assert_eq!(patch.category.as_deref(), Some("laptops"));
        assert_eq!(patch.sort, Some(SortField::Rating));
        assert_eq!(patch.order, Some(SortOrder::Desc));
        assert_eq!(patch.page, Some(IntParam::Value(3)));
        assert_eq!(patch.limit, Some(IntParam::Value(6)));
    }

    #[test]
    fn test_decode_absent_keys_keep_defaults() {
        let state = decode_state("category=beauty&utm_source=mail");

        assert!(state.initialized);
        assert_eq!(state.category, "beauty");
        assert_eq!(state.query, None);
        assert_eq!(state.page, IntParam::Value(1));
        assert_eq!(state.limit, IntParam::Value(12));
    }

    #[test]
    fn test_decode_malformed_page_passes_through() {
        let state = decode_state("page=invalid-page&limit=lots");

        assert_eq!(state.page, IntParam::NotANumber);
        assert_eq!(state.limit, IntParam::NotANumber);
    }

    #[test]
    fn test_decode_unknown_sort_is_ignored() {
        let state = decode_state("sort=popularity&order=sideways");

        assert_eq!(state.sort, SortField::Unset);
        assert_eq!(state.order, SortOrder::Unset);
    }

    #[test]
    fn test_decode_first_value_wins() {
        let patch = decode_from_external("q=first&q=second");
        assert_eq!(patch.query.as_deref(), Some("first"));
    }

    #[test]
    fn test_decode_empty_values_are_absent() {
        let patch = decode_from_external("q=&category=");
        assert_eq!(patch, FilterPatch::default());
    }

    #[test]
    fn test_round_trip_non_default_state() {
        let states = [
            FilterState {
                query: Some("iphone 15".to_string()),
                initialized: true,
                ..FilterState::default()
            },
            FilterState {
                category: "smartphones".to_string(),
                sort: SortField::Title,
                order: SortOrder::Desc,
                page: IntParam::Value(17),
                initialized: true,
                ..FilterState::default()
            },
            FilterState {
                query: Some("a+b=c&d".to_string()),
                category: "home-decoration".to_string(),
                sort: SortField::Price,
                order: SortOrder::Asc,
                page: IntParam::Value(2),
                limit: IntParam::Value(30),
                initialized: true,
            },
        ];

        for state in states {
            assert_eq!(decode_state(&encode_to_external(&state)), state);
        }
    }
}
