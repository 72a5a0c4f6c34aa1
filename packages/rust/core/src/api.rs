//! Request and response shapes at the pipeline boundary.
//!
//! Field aliases accept the camelCase names used by existing front ends
//! (`productId`, `fileUrl`, and `messages` for a message's text).

use std::path::PathBuf;

use pdfrag_shared::{ChatMessage, DocumentId, PdfRagError, Result};
use serde::{Deserialize, Serialize};

/// Status text returned after a successful ingestion.
pub const INGEST_STATUS: &str = "PDF uploaded successfully";

/// Wire role for user turns.
const WIRE_USER: &str = "user";
/// Wire role for assistant turns.
const WIRE_BOT: &str = "bot";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "fileUrl")]
    pub source_url: String,
    #[serde(alias = "productId")]
    pub document_id: DocumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status_message: String,
    pub document_id: DocumentId,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "productId")]
    pub document_id: DocumentId,
    pub question: String,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

/// One conversation turn as front ends send it: role is `user` or `bot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(alias = "messages")]
    pub text: String,
}

impl WireMessage {
    pub fn into_chat(self) -> Result<ChatMessage> {
        match self.role.as_str() {
            WIRE_USER => Ok(ChatMessage::User(self.text)),
            WIRE_BOT => Ok(ChatMessage::Assistant(self.text)),
            other => Err(PdfRagError::validation(format!(
                "unsupported message role '{other}' (expected '{WIRE_USER}' or '{WIRE_BOT}')"
            ))),
        }
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message {
            ChatMessage::User(_) => WIRE_USER,
            ChatMessage::Assistant(_) => WIRE_BOT,
        };
        Self {
            role: role.to_string(),
            text: message.content().to_string(),
        }
    }
}

impl QueryRequest {
    /// Convert every wire message, failing on the first unknown role.
    pub fn history(&self) -> Result<Vec<ChatMessage>> {
        self.messages
            .iter()
            .cloned()
            .map(WireMessage::into_chat)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    /// History after the run, in wire form so it can be sent back as-is.
    pub history: Vec<WireMessage>,
}
