//! Error types for jamdex operations

use thiserror::Error;

/// Main error type for jamdex operations
#[derive(Error, Debug)]
pub enum JamdexError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected GitHub response: {message}")]
    Response { message: String },

    #[error("Tokenizer worker failed: {message}")]
    WorkerFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JamdexError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }
}

/// Result type alias for jamdex operations
pub type Result<T> = std::result::Result<T, JamdexError>;
