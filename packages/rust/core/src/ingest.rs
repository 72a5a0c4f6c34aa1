//! Ingestion pipeline: Fetch → Load → Split → Embed-and-Index → Persist.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pdfrag_loader::{Fetcher, PageLoader, TextSplitter};
use pdfrag_providers::Embedder;
use pdfrag_shared::{Chunk, DocumentId, Page, PdfRagError, Result};
use pdfrag_storage::{IndexMeta, IndexStore, VectorIndex};
use tracing::{debug, info, warn};

use crate::workflow::{CompiledWorkflow, Step, Workflow};

pub const FETCH: &str = "fetch";
pub const LOAD: &str = "load";
pub const SPLIT: &str = "split";
pub const EMBED_AND_INDEX: &str = "embed_and_index";
pub const PERSIST: &str = "persist";

/// State threaded through one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionState {
    pub source_url: String,
    pub document_id: DocumentId,
    /// Downloaded file; present only between Fetch and Load.
    pub temp_path: Option<PathBuf>,
    /// SHA-256 of the downloaded bytes.
    pub content_hash: Option<String>,
    pub pages: Option<Vec<Page>>,
    pub chunks: Option<Vec<Chunk>>,
    /// In-memory index; only its persisted form outlives the run.
    pub index: Option<VectorIndex>,
    /// Directory the index was written to.
    pub store_path: Option<PathBuf>,
}

impl IngestionState {
    pub fn new(source_url: impl Into<String>, document_id: DocumentId) -> Self {
        Self {
            source_url: source_url.into(),
            document_id,
            temp_path: None,
            content_hash: None,
            pages: None,
            chunks: None,
            index: None,
            store_path: None,
        }
    }
}

/// Collaborators the ingestion steps need.
pub struct IngestionParts {
    pub fetcher: Fetcher,
    pub loader: Arc<dyn PageLoader>,
    pub splitter: TextSplitter,
    pub embedder: Arc<dyn Embedder>,
    pub store: IndexStore,
}

/// Wire the five ingestion steps into a linear workflow.
pub fn ingestion_workflow(parts: IngestionParts) -> Result<CompiledWorkflow<IngestionState>> {
    let embedding_model = parts.embedder.model_name().to_string();

    Workflow::new("ingest")
        .add_step(FETCH, FetchStep { fetcher: parts.fetcher })
        .add_step(LOAD, LoadStep { loader: parts.loader })
        .add_step(SPLIT, SplitStep { splitter: parts.splitter })
        .add_step(EMBED_AND_INDEX, EmbedAndIndexStep { embedder: parts.embedder })
        .add_step(
            PERSIST,
            PersistStep {
                store: parts.store,
                embedding_model,
            },
        )
        .set_entry(FETCH)
        .add_edge(FETCH, LOAD)
        .add_edge(LOAD, SPLIT)
        .add_edge(SPLIT, EMBED_AND_INDEX)
        .add_edge(EMBED_AND_INDEX, PERSIST)
        .set_finish(PERSIST)
        .compile()
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

struct FetchStep {
    fetcher: Fetcher,
}

#[async_trait]
impl Step<IngestionState> for FetchStep {
    async fn run(&self, state: &mut IngestionState) -> Result<()> {
        let fetched = self.fetcher.fetch(&state.source_url).await?;
        state.temp_path = Some(fetched.path);
        state.content_hash = Some(fetched.content_hash);
        Ok(())
    }
}

struct LoadStep {
    loader: Arc<dyn PageLoader>,
}

#[async_trait]
impl Step<IngestionState> for LoadStep {
    async fn run(&self, state: &mut IngestionState) -> Result<()> {
        let path = state
            .temp_path
            .take()
            .ok_or_else(|| PdfRagError::precondition("load ran before a document was fetched"))?;

        let loaded = self.loader.load(&path).await;
        remove_temp_file(&path).await;

        let pages = loaded?;
        debug!(pages = pages.len(), "document loaded");
        state.pages = Some(pages);
        Ok(())
    }
}

/// Delete a fetched file. Already-gone files are fine.
async fn remove_temp_file(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "temp file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temp file"),
    }
}

struct SplitStep {
    splitter: TextSplitter,
}

#[async_trait]
impl Step<IngestionState> for SplitStep {
    async fn run(&self, state: &mut IngestionState) -> Result<()> {
        let pages = state
            .pages
            .as_deref()
            .ok_or_else(|| PdfRagError::precondition("split ran before pages were loaded"))?;

        let chunks = self.splitter.split_pages(pages);
        debug!(chunks = chunks.len(), "pages split");
        state.chunks = Some(chunks);
        Ok(())
    }
}

struct EmbedAndIndexStep {
    embedder: Arc<dyn Embedder>,
}

#[async_trait]
impl Step<IngestionState> for EmbedAndIndexStep {
    async fn run(&self, state: &mut IngestionState) -> Result<()> {
        let chunks = state
            .chunks
            .as_deref()
            .ok_or_else(|| PdfRagError::precondition("embedding ran before chunks were produced"))?;

        if chunks.is_empty() {
            return Err(PdfRagError::validation(format!(
                "document {} produced no text chunks to index",
                state.document_id
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;
        let index = VectorIndex::build(chunks.to_vec(), vectors)?;

        debug!(entries = index.len(), dimensions = index.dimensions(), "index built");
        state.index = Some(index);
        Ok(())
    }
}

struct PersistStep {
    store: IndexStore,
    embedding_model: String,
}

#[async_trait]
impl Step<IngestionState> for PersistStep {
    async fn run(&self, state: &mut IngestionState) -> Result<()> {
        let index = state
            .index
            .as_ref()
            .ok_or_else(|| PdfRagError::config("persist requires a built index"))?;

        let meta = IndexMeta {
            document_id: state.document_id,
            source_url: state.source_url.clone(),
            content_hash: state.content_hash.clone(),
            embedding_model: self.embedding_model.clone(),
            dimensions: index.dimensions(),
            chunk_count: index.len(),
            created_at: Utc::now(),
        };

        let dir = self.store.save(index, &meta).await?;
        info!(document_id = %state.document_id, path = %dir.display(), "document indexed");
        state.store_path = Some(dir);
        Ok(())
    }
}
