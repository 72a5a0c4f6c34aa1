//! Shared types, error model, and configuration for pdfrag.
//!
//! This crate is the foundation depended on by all other pdfrag crates.
//! It provides:
//! - [`PdfRagError`]: the unified error type
//! - Domain types ([`DocumentId`], [`ChatMessage`], [`Page`], [`Chunk`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenAiConfig, PipelineConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{PdfRagError, Result};
pub use types::{ChatMessage, Chunk, DocumentId, Page, Role};
