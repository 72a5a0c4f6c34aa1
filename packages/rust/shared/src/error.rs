//! Error types for pdfrag.
//!
//! Library crates use [`PdfRagError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pdfrag operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfRagError {
    /// Configuration loading or validation error, and pipeline wiring mistakes.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a source document.
    #[error("network error: {0}")]
    Network(String),

    /// PDF parsing or text extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Vector index persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding or completion provider error.
    #[error("provider error: {0}")]
    Provider(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller supplied data that breaks the boundary contract.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A required persisted resource does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A step ran before the step that produces its input.
    #[error("precondition failed: {message}")]
    Precondition { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PdfRagError>;

impl PdfRagError {
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

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
