//! Embedding and chat-completion providers.
//!
//! The pipelines only see the [`Embedder`] and [`ChatModel`] traits; the
//! OpenAI-compatible HTTP implementations live here too. Provider failures
//! surface as `PdfRagError::Provider` and are never retried.

pub mod chat;
pub mod embed;
mod http;

pub use chat::{ChatModel, OpenAiChatModel, Prompt};
pub use embed::{Embedder, OpenAiEmbedder};
pub use http::OpenAiClient;
