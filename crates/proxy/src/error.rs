//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Each variant maps to a JSON
//! body and an explicit status code. Upstream details are logged and sent to
//! Sentry but never echoed to the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Application-level error type for the proxy.
#[derive(Debug, Error)]
pub enum AppError {
    /// Listing fetch failed after the retry budget was spent.
    #[error("Failed to fetch products after {attempts} attempt(s): {source}")]
    Products {
        attempts: u32,
        #[source]
        source: UpstreamError,
    },

    /// Category list fetch failed.
    #[error("Failed to fetch categories: {0}")]
    Categories(#[source] UpstreamError),

    /// Single product fetch failed for a reason other than absence.
    #[error("Failed to fetch product: {0}")]
    Product(#[source] UpstreamError),

    /// Upstream has no such product.
    #[error("Product not found")]
    ProductNotFound,

    /// Unknown POST action.
    #[error("Invalid action")]
    InvalidAction,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ProductNotFound => StatusCode::NOT_FOUND,
            Self::InvalidAction => StatusCode::BAD_REQUEST,
            Self::Products { .. } | Self::Categories(_) | Self::Product(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    const fn is_server_error(&self) -> bool {
        !matches!(self, Self::ProductNotFound | Self::InvalidAction)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose upstream status or internal details to clients
        let body = match &self {
            Self::Products { attempts, .. } => json!({
                "error": "Failed to fetch products",
                "message": format!("Upstream request failed after {attempts} attempt(s)"),
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            Self::Categories(_) => json!({ "error": "Failed to fetch categories" }),
            Self::Product(_) => json!({
                "error": "Failed to fetch product",
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            Self::ProductNotFound => json!({ "error": "Product not found" }),
            Self::InvalidAction => json!({ "error": "Invalid action" }),
            Self::Internal(_) => json!({ "error": "Internal server error" }),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn upstream_500() -> UpstreamError {
        UpstreamError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
        }
    }

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::ProductNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidAction.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Categories(upstream_500()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("test".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_products_error_masks_upstream_status() {
        let (status, body) = body_of(AppError::Products {
            attempts: 2,
            source: upstream_500(),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch products");
        assert_eq!(body["message"], "Upstream request failed after 2 attempt(s)");
        assert!(body["timestamp"].is_string());
        assert!(!body.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_invalid_action_body() {
        let (status, body) = body_of(AppError::InvalidAction).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid action" }));
    }
}
