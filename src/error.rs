//! Error types for litsearch.
//!
//! Source adapters convert every one of these into a per-source error string, so
//! only validation and total-failure variants ever reach a caller of the
//! search pipeline.

use crate::paper::SourceId;
use thiserror::Error;

/// Main error type for litsearch operations.
#[derive(Debug, Error)]
pub enum LitSearchError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// Google Scholar served a CAPTCHA page
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Search request carried a blank query
    #[error("missing query")]
    MissingQuery,

    /// Search request selected no sources
    #[error("no sources selected")]
    NoSources,

    /// Every selected source failed
    #[error("all {} sources failed", failures.len())]
    AllSourcesFailed {
        /// `(source, error message)` for every failed source, in request order
        failures: Vec<(SourceId, String)>,
    },
}

impl LitSearchError {
    /// Whether the error was caused by the caller's request rather than a source.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingQuery | Self::NoSources | Self::Validation(_)
        )
    }
}

/// Result type alias using `LitSearchError`
pub type Result<T> = std::result::Result<T, LitSearchError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LitSearchError::Parse(msg.to_string()))
    }
}
