//! CLI subcommands.

pub mod browse;
pub mod catalog;
pub mod output;
pub mod search;

use catalog_client::config::ConfigError;
use catalog_client::{ApiError, FetchError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The query settled in its failed state.
    #[error("Fetch failed with status {}: {}", .0.status_code, .0.message)]
    Failed(ApiError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
