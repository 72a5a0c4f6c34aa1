//! Query pipeline: Load-Index → Retrieve → (Summarize-History) → Generate-Answer.

use std::sync::Arc;

use async_trait::async_trait;
use pdfrag_providers::{ChatModel, Embedder, Prompt};
use pdfrag_shared::{ChatMessage, DocumentId, PdfRagError, Result};
use pdfrag_storage::{IndexStore, VectorIndex};
use tracing::{debug, info, warn};

use crate::history;
use crate::prompts::{ANSWER_INSTRUCTION, SUMMARY_INSTRUCTION};
use crate::workflow::{CompiledWorkflow, Step, Workflow};

pub const LOAD_INDEX: &str = "load_index";
pub const RETRIEVE: &str = "retrieve";
pub const SUMMARIZE: &str = "summarize";
pub const GENERATE: &str = "generate";

/// Chunks retrieved per question.
pub const RETRIEVAL_K: usize = 3;

/// Separator between retrieved chunks in the context block.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// State threaded through one query run.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub document_id: DocumentId,
    pub question: String,
    pub index: Option<VectorIndex>,
    /// Top-k chunk texts joined by blank lines.
    pub retrieved_context: Option<String>,
    pub history: Vec<ChatMessage>,
    pub answer: Option<String>,
}

impl QueryState {
    pub fn new(document_id: DocumentId, question: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            document_id,
            question: question.into(),
            index: None,
            retrieved_context: None,
            history,
            answer: None,
        }
    }
}

/// Where the query pipeline goes after retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Summarize,
    Generate,
}

impl NextStep {
    pub fn step_name(self) -> &'static str {
        match self {
            Self::Summarize => SUMMARIZE,
            Self::Generate => GENERATE,
        }
    }
}

/// Route long histories through compaction first.
pub fn decide_next(history: &[ChatMessage]) -> NextStep {
    if history::needs_compaction(history) {
        NextStep::Summarize
    } else {
        NextStep::Generate
    }
}

/// Collaborators the query steps need.
pub struct QueryParts {
    pub store: IndexStore,
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
}

/// Wire the query steps, including the compaction branch.
pub fn query_workflow(parts: QueryParts) -> Result<CompiledWorkflow<QueryState>> {
    Workflow::new("query")
        .add_step(
            LOAD_INDEX,
            LoadIndexStep {
                store: parts.store,
                embedding_model: parts.embedder.model_name().to_string(),
            },
        )
        .add_step(
            RETRIEVE,
            RetrieveStep {
                embedder: parts.embedder,
                k: RETRIEVAL_K,
            },
        )
        .add_step(SUMMARIZE, SummarizeStep { chat: Arc::clone(&parts.chat) })
        .add_step(GENERATE, GenerateStep { chat: parts.chat })
        .set_entry(LOAD_INDEX)
        .add_edge(LOAD_INDEX, RETRIEVE)
        .add_conditional_edge(RETRIEVE, &[SUMMARIZE, GENERATE], |state: &QueryState| {
            decide_next(&state.history).step_name()
        })
        .add_edge(SUMMARIZE, GENERATE)
        .set_finish(GENERATE)
        .compile()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

struct LoadIndexStep {
    store: IndexStore,
    embedding_model: String,
}

#[async_trait]
impl Step<QueryState> for LoadIndexStep {
    async fn run(&self, state: &mut QueryState) -> Result<()> {
        let (index, meta) = self.store.load(state.document_id).await?;

        if meta.embedding_model != self.embedding_model {
            warn!(
                document_id = %state.document_id,
                indexed_with = %meta.embedding_model,
                querying_with = %self.embedding_model,
                "embedding model differs from the one used at ingestion"
            );
        }

        state.index = Some(index);
        Ok(())
    }
}

struct RetrieveStep {
    embedder: Arc<dyn Embedder>,
    k: usize,
}

#[async_trait]
impl Step<QueryState> for RetrieveStep {
    async fn run(&self, state: &mut QueryState) -> Result<()> {
        let index = state
            .index
            .as_ref()
            .ok_or_else(|| PdfRagError::precondition("retrieve ran before the index was loaded"))?;

        let query = self.embedder.embed_query(&state.question).await?;
        let hits = index.search(&query, self.k)?;
        debug!(hits = hits.len(), "chunks retrieved");

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        state.retrieved_context = Some(context);
        Ok(())
    }
}

struct SummarizeStep {
    chat: Arc<dyn ChatModel>,
}

#[async_trait]
impl Step<QueryState> for SummarizeStep {
    async fn run(&self, state: &mut QueryState) -> Result<()> {
        if !history::needs_compaction(&state.history) {
            return Ok(());
        }

        let prompt = Prompt::new(SUMMARY_INSTRUCTION)
            .with_message(ChatMessage::user(history::transcript(&state.history)));
        let summary = self.chat.complete(&prompt).await?;

        info!(folded = state.history.len(), "history compacted");
        state.history = vec![history::summary_message(&summary)];
        Ok(())
    }
}

struct GenerateStep {
    chat: Arc<dyn ChatModel>,
}

#[async_trait]
impl Step<QueryState> for GenerateStep {
    async fn run(&self, state: &mut QueryState) -> Result<()> {
        let context = state
            .retrieved_context
            .as_deref()
            .ok_or_else(|| PdfRagError::precondition("generate ran before retrieval"))?;

        let prompt = answer_prompt(context, &state.history, &state.question);
        let answer = self.chat.complete(&prompt).await?;

        state.history.push(ChatMessage::assistant(answer.clone()));
        state.answer = Some(answer);
        Ok(())
    }
}

/// System instruction with the context block, then the prior turns, then
/// the question. The question is not recorded in history.
fn answer_prompt(context: &str, history: &[ChatMessage], question: &str) -> Prompt {
    Prompt::new(format!("{ANSWER_INSTRUCTION}\n\nContext:\n{context}"))
        .with_messages(history.iter().cloned())
        .with_message(ChatMessage::user(question))
}
