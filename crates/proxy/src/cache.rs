//! Cached response bodies and their content fingerprints.
//!
//! Listings are serialized once when stored. The ETag is derived from those
//! exact bytes, so hits and misses for the same entry carry the same tag.

use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A serialized response body ready to be served repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBody {
    pub body: Bytes,
    pub etag: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedBody {
    /// Serialize `value` and fingerprint the result.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn new<T: Serialize>(value: &T, fetched_at: DateTime<Utc>) -> Result<Self, serde_json::Error> {
        let body = Bytes::from(serde_json::to_vec(value)?);
        let etag = etag_for(&body);
        Ok(Self {
            body,
            etag,
            fetched_at,
        })
    }

    /// Whether an `If-None-Match` header value matches this entry.
    #[must_use]
    pub fn matches(&self, if_none_match: &str) -> bool {
        if_none_match.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == self.etag
        })
    }
}

/// Strong ETag for a body: quoted, URL-safe base64 of its SHA-256 digest.
#[must_use]
pub fn etag_for(body: &[u8]) -> String {
    format!("\"{}\"", URL_SAFE_NO_PAD.encode(Sha256::digest(body)))
}
