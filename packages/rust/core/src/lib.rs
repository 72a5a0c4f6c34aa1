//! Pipeline orchestration for pdfrag.
//!
//! This crate ties the loader, providers, and index store together into two
//! workflows driven by [`workflow::CompiledWorkflow`]:
//! - [`ingest`]: fetch a PDF, split it, embed the chunks, persist the index
//! - [`query`]: load an index, retrieve context, compact long histories,
//!   and generate an answer
//!
//! [`Engine`] is the entry point front ends call.

pub mod api;
pub mod engine;
pub mod history;
pub mod ingest;
pub mod prompts;
pub mod query;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use api::{IngestRequest, IngestResponse, QueryRequest, QueryResponse, WireMessage};
pub use engine::{Engine, Providers};
pub use workflow::{ProgressReporter, SilentProgress};
