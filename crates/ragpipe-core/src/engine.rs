//! The caller-facing surface: one dependency-injected context object
//! exposing every pipeline operation.

use std::sync::Arc;
use std::time::Duration;

use ragpipe_guard::Guardrails;
use ragpipe_llm::{CompletionRequest, EmbeddingClient, LlmClient};
use ragpipe_memory::{
    DocumentError, DocumentIndex, DocumentSummary, IndexError, IngestReport, IngestionPipeline,
    MemoryConfig, MemoryError, SessionMemory, SplitterConfig, SummaryEntry, TextSplitter, Turn,
    VectorBackend,
};
use serde::Serialize;

use crate::config::Config;
use crate::orchestrator::{
    QueryError, QueryOrchestrator, QueryRequest, QueryResult, TurnSettings,
};

/// Both memory tiers of a session, for inspection.
#[derive(Debug, Default)]
pub struct SessionSnapshot {
    pub short_term: Vec<Turn>,
    pub long_term: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Health {
    pub vector_store_ok: bool,
    pub memory_store_ok: bool,
}

impl Health {
    #[must_use]
    pub const fn ok(self) -> bool {
        self.vector_store_ok && self.memory_store_ok
    }
}

/// Service context wired once at startup.
pub struct Engine {
    llm: Arc<dyn LlmClient>,
    index: DocumentIndex,
    memory: SessionMemory,
    guard: Guardrails,
    pipeline: IngestionPipeline,
    orchestrator: QueryOrchestrator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Open session storage and assemble the pipeline from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the session database cannot be opened.
    pub async fn new(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        backend: Arc<dyn VectorBackend>,
    ) -> Result<Self, MemoryError> {
        let memory = SessionMemory::new(
            &config.memory.sqlite_path,
            MemoryConfig {
                max_exchanges: config.memory.max_exchanges,
                short_term_ttl: Duration::from_secs(config.memory.short_term_ttl_secs),
                long_term_ttl: Duration::from_secs(config.memory.long_term_ttl_secs),
            },
        )
        .await?;

        Ok(Self::from_parts(config, llm, embedder, backend, memory))
    }

    /// Assemble the pipeline over an already-open [`SessionMemory`].
    #[must_use]
    pub fn from_parts(
        config: &Config,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingClient>,
        backend: Arc<dyn VectorBackend>,
        memory: SessionMemory,
    ) -> Self {
        let index = DocumentIndex::new(backend, embedder);
        let guard = Guardrails::new(config.guardrails.clone());
        let pipeline = IngestionPipeline::new(
            TextSplitter::new(SplitterConfig {
                chunk_size: config.document.chunk_size,
                chunk_overlap: config.document.chunk_overlap,
            }),
            index.clone(),
            config.max_file_bytes(),
        );
        let orchestrator = QueryOrchestrator::new(
            Arc::clone(&llm),
            index.clone(),
            memory.clone(),
            guard.clone(),
            TurnSettings {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                timeout: Duration::from_secs(config.llm.timeout_secs),
                top_k: config.retrieval.top_k,
                score_threshold: config.retrieval.score_threshold,
                history_in_prompt: config.retrieval.history_in_prompt,
            },
        );

        Self {
            llm,
            index,
            memory,
            guard,
            pipeline,
            orchestrator,
        }
    }

    /// Run one query turn end to end.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Generation` when the completion call fails.
    pub async fn submit_query(&self, request: QueryRequest) -> Result<QueryResult, QueryError> {
        self.orchestrator.submit_query(request).await
    }

    /// Ingest raw file bytes into the document index.
    ///
    /// # Errors
    ///
    /// Returns the failing ingestion stage.
    pub async fn ingest_document(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestReport, DocumentError> {
        self.pipeline.ingest_bytes(filename, bytes).await
    }

    /// Both memory tiers for a session. Fail-open: a storage error logs
    /// and reads as empty.
    pub async fn get_memory(&self, session_id: &str) -> SessionSnapshot {
        let short_term = self.memory.turns(session_id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "short-term memory read failed");
            Vec::new()
        });
        let long_term = self
            .memory
            .get_summaries(session_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "long-term memory read failed");
                Vec::new()
            });
        SessionSnapshot {
            short_term,
            long_term,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the deletes fail.
    pub async fn clear_memory(&self, session_id: &str) -> Result<(), MemoryError> {
        self.memory.clear_session(session_id).await
    }

    /// # Errors
    ///
    /// Returns an error if the backend listing fails.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        self.index.list_documents().await
    }

    /// Idempotent; `false` means the document was not present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool, IndexError> {
        self.index.delete_document(document_id).await
    }

    /// Summarize the session's recent exchanges into long-term memory.
    ///
    /// The summary is PII-sanitized before storage. With no unexpired
    /// exchanges nothing is stored and a fixed notice is returned.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Generation` when the completion call fails.
    pub async fn summarize_session(&self, session_id: &str) -> Result<String, QueryError> {
        let exchanges = self.memory.get_exchanges(session_id).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "memory read failed before summarization");
            Vec::new()
        });
        if exchanges.is_empty() {
            return Ok("No conversation to summarize.".to_owned());
        }

        let transcript = exchanges
            .iter()
            .map(|x| format!("USER: {}\nASSISTANT: {}", x.user_text, x.ai_text))
            .collect::<Vec<_>>()
            .join("\n");

        let request = CompletionRequest::new(format!(
            "Provide a concise summary of the following conversation:\n\n{transcript}\n\nSummary:"
        ))
        .with_temperature(0.3);
        let completion = self.llm.complete(request).await?;

        let summary = self.guard.sanitize(&completion.text).into_owned();
        let metadata = serde_json::json!({
            "kind": "session_summary",
            "exchanges": exchanges.len(),
        });
        if let Err(e) = self.memory.append_summary(session_id, &summary, &metadata).await {
            tracing::warn!(error = %e, "failed to store session summary");
        }
        Ok(summary)
    }

    pub async fn health(&self) -> Health {
        Health {
            vector_store_ok: self.index.healthy().await,
            memory_store_ok: self.memory.healthy().await,
        }
    }
}
