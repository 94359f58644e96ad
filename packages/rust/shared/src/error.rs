//! Error types for TweetRAG.
//!
//! Library crates use [`TweetRagError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all TweetRAG operations.
#[derive(Debug, thiserror::Error)]
pub enum TweetRagError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the model runtime.
    #[error("network error: {0}")]
    Network(String),

    /// Archive or response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or vector store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding or generation model error (bad or empty model output).
    #[error("model error: {0}")]
    Model(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (unsupported file type, dimension mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TweetRagError>;

impl TweetRagError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// A request to `url` failed.
    pub fn network(url: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Network(format!("{url}: {err}"))
    }

    /// A collection was opened with a different embedding model than the one
    /// that filled it. Vectors from different models are not comparable.
    pub fn model_mismatch(collection: &str, stored: &str, requested: &str) -> Self {
        Self::validation(format!(
            "collection '{collection}' was built with embedding model '{stored}', not '{requested}'; \
             run `tweetrag reset` to rebuild it with the new model"
        ))
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
