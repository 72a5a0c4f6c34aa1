//! Document acquisition: download, page extraction, and chunking.
//!
//! This crate provides:
//! - [`fetch`]: download a remote PDF into a uniquely named temp file
//! - [`pdf`]: the [`PageLoader`] seam and its `pdf-extract` implementation
//! - [`splitter`]: deterministic recursive character splitting into chunks

pub mod fetch;
pub mod pdf;
pub mod splitter;

pub use fetch::{FetchOptions, FetchedFile, Fetcher};
pub use pdf::{PageLoader, PdfLoader, normalize_page_text};
pub use splitter::{CHUNK_OVERLAP, CHUNK_SIZE, TextSplitter};
