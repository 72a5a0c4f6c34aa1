//! Entry points bundling configuration, providers, and both pipelines.

use std::sync::Arc;

use pdfrag_loader::{FetchOptions, Fetcher, PageLoader, PdfLoader, TextSplitter};
use pdfrag_providers::{ChatModel, Embedder, OpenAiChatModel, OpenAiClient, OpenAiEmbedder};
use pdfrag_shared::{AppConfig, PdfRagError, PipelineConfig, Result, resolve_api_key};
use pdfrag_storage::IndexStore;
use tracing::{info, instrument};

use crate::api::{INGEST_STATUS, IngestRequest, IngestResponse, QueryRequest, QueryResponse, WireMessage};
use crate::ingest::{IngestionParts, IngestionState, ingestion_workflow};
use crate::query::{QueryParts, QueryState, query_workflow};
use crate::workflow::{CompiledWorkflow, ProgressReporter};

/// External services the pipelines call out to.
pub struct Providers {
    pub embedder: Arc<dyn Embedder>,
    pub chat: Arc<dyn ChatModel>,
    pub loader: Arc<dyn PageLoader>,
}

impl Providers {
    /// OpenAI-compatible embedder and chat model plus the PDF loader.
    pub fn openai(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        let runtime = PipelineConfig::from(config);
        let client = OpenAiClient::new(&runtime.base_url, api_key)?;

        Ok(Self {
            embedder: Arc::new(OpenAiEmbedder::new(client.clone(), runtime.embedding_model)),
            chat: Arc::new(OpenAiChatModel::new(client, runtime.chat_model)),
            loader: Arc::new(PdfLoader),
        })
    }
}

/// Compiled ingestion and query pipelines sharing one index store.
///
/// Every call builds a fresh state record; nothing but the on-disk indices
/// is shared between calls.
pub struct Engine {
    store: IndexStore,
    ingestion: CompiledWorkflow<IngestionState>,
    query: CompiledWorkflow<QueryState>,
}

impl Engine {
    pub fn new(config: &PipelineConfig, providers: Providers) -> Result<Self> {
        let store = IndexStore::new(&config.stores_dir);
        let fetcher = Fetcher::new(&FetchOptions {
            timeout_secs: config.fetch_timeout_secs,
            ..FetchOptions::default()
        })?;

        let ingestion = ingestion_workflow(IngestionParts {
            fetcher,
            loader: providers.loader,
            splitter: TextSplitter::default(),
            embedder: Arc::clone(&providers.embedder),
            store: store.clone(),
        })?;
        let query = query_workflow(QueryParts {
            store: store.clone(),
            embedder: providers.embedder,
            chat: providers.chat,
        })?;

        Ok(Self {
            store,
            ingestion,
            query,
        })
    }

    /// Engine wired to OpenAI from the application config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        Self::new(&PipelineConfig::from(config), Providers::openai(config)?)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Download, index, and persist one document.
    #[instrument(skip_all, fields(document_id = %request.document_id))]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestResponse> {
        let state = IngestionState::new(request.source_url, request.document_id);
        let done = self.ingestion.run(state, progress).await?;

        let store_path = done
            .store_path
            .ok_or_else(|| PdfRagError::config("ingestion finished without a store path"))?;
        info!(path = %store_path.display(), "ingestion complete");

        Ok(IngestResponse {
            status_message: INGEST_STATUS.to_string(),
            document_id: done.document_id,
            store_path,
        })
    }

    /// Answer one question against a previously ingested document.
    ///
    /// Message roles are checked before any step runs.
    #[instrument(skip_all, fields(document_id = %request.document_id))]
    pub async fn query(
        &self,
        request: QueryRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<QueryResponse> {
        let history = request.history()?;
        let state = QueryState::new(request.document_id, request.question, history);
        let done = self.query.run(state, progress).await?;

        let answer = done
            .answer
            .ok_or_else(|| PdfRagError::config("query finished without an answer"))?;

        Ok(QueryResponse {
            answer,
            history: done.history.iter().map(WireMessage::from).collect(),
        })
    }
}
