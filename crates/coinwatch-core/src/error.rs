use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for Coinwatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// The HTTP client or request could not be set up.
    #[error("Init error: {0}")]
    InitError(String),

    /// Transfer failed, was refused, or was interrupted.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Extraction produced no combined records.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A field pattern failed to compile or has the wrong number of groups.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Configuration value missing or malformed.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Pipeline stage a cycle failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fetch,
    Parse,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Fetch => "fetch",
            FailureStage::Parse => "parse",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AppError {
    /// The pipeline stage this error belongs to when it ends a cycle.
    ///
    /// Everything raised before a document is in hand counts as a fetch
    /// failure; only an empty extraction counts as a parse failure.
    pub fn stage(&self) -> FailureStage {
        match self {
            AppError::ParseError(_) => FailureStage::Parse,
            _ => FailureStage::Fetch,
        }
    }
}
