//! The query turn as an explicit state machine. Each transition owns one
//! pipeline step and its fail-open decision, so every step is testable in
//! isolation.

use std::sync::Arc;
use std::time::Duration;

use ragpipe_guard::{Guardrails, Verdict};
use ragpipe_llm::{CompletionRequest, GenerationError, LlmClient};
use ragpipe_memory::{DocumentIndex, ScoredChunk, SessionMemory, Turn};
use serde::Serialize;

use crate::prompt::build_prompt;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: String,
    pub use_context: bool,
    pub temperature: Option<f32>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            use_context: true,
            temperature: None,
        }
    }
}

/// Provenance of one retrieved chunk that informed the answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub document_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub answer: String,
    pub session_id: String,
    pub sources: Option<Vec<SourceRef>>,
    pub guardrails_passed: bool,
    pub token_usage: Option<u32>,
}

/// The only fatal error of a query turn. Everything else degrades.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Pipeline position of a query turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    InputValidated,
    ContextRetrieved,
    MemoryRead,
    Generated,
    OutputValidated,
    MemoryWritten,
    Done,
}

/// Mutable state accumulated across transitions of one turn.
#[derive(Debug, Default)]
pub struct TurnState {
    pub context: Vec<ScoredChunk>,
    pub history: Vec<Turn>,
    pub answer: String,
    pub token_usage: Option<u32>,
    pub guardrails_passed: bool,
    pub record_exchange: bool,
}

impl TurnState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            guardrails_passed: true,
            record_exchange: true,
            ..Self::default()
        }
    }
}

/// Tunables fixed at construction, shared by every turn.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub top_k: usize,
    pub score_threshold: f32,
    pub history_in_prompt: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
            top_k: 5,
            score_threshold: 0.7,
            history_in_prompt: 5,
        }
    }
}

/// Drives a query turn through its stages.
pub struct QueryOrchestrator {
    llm: Arc<dyn LlmClient>,
    index: DocumentIndex,
    memory: SessionMemory,
    guard: Guardrails,
    settings: TurnSettings,
}

impl std::fmt::Debug for QueryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl QueryOrchestrator {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        index: DocumentIndex,
        memory: SessionMemory,
        guard: Guardrails,
        settings: TurnSettings,
    ) -> Self {
        Self {
            llm,
            index,
            memory,
            guard,
            settings,
        }
    }

    /// Run one transition. Fail-open decisions live here: retrieval and
    /// memory failures degrade with a `warn`, a blocked input
    /// short-circuits to `Done`, and only generation failure is fatal.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Generation` when the completion call fails.
    pub async fn advance(
        &self,
        stage: Stage,
        request: &QueryRequest,
        state: &mut TurnState,
    ) -> Result<Stage, QueryError> {
        match stage {
            Stage::Received => {
                match self.guard.validate_input(&request.query) {
                    Verdict::Blocked { message } => {
                        state.answer = message;
                        state.guardrails_passed = false;
                        state.record_exchange = false;
                        Ok(Stage::Done)
                    }
                    Verdict::Pass { .. } => Ok(Stage::InputValidated),
                }
            }
            Stage::InputValidated => {
                if request.use_context {
                    match self
                        .index
                        .similarity_search(
                            &request.query,
                            self.settings.top_k,
                            self.settings.score_threshold,
                        )
                        .await
                    {
                        Ok(chunks) => state.context = chunks,
                        Err(e) => {
                            tracing::warn!(error = %e, "context retrieval failed, proceeding without");
                        }
                    }
                }
                Ok(Stage::ContextRetrieved)
            }
            Stage::ContextRetrieved => {
                match self.memory.turns(&request.session_id).await {
                    Ok(turns) => state.history = turns,
                    Err(e) => {
                        tracing::warn!(error = %e, "memory read failed, proceeding without history");
                    }
                }
                Ok(Stage::MemoryRead)
            }
            Stage::MemoryRead => {
                let prompt = build_prompt(
                    &request.query,
                    &state.context,
                    &state.history,
                    self.settings.history_in_prompt,
                );
                let completion_request = CompletionRequest {
                    prompt,
                    temperature: request.temperature.unwrap_or(self.settings.temperature),
                    max_tokens: self.settings.max_tokens,
                    timeout: self.settings.timeout,
                };
                let completion = self.llm.complete(completion_request).await?;
                state.answer = completion.text;
                state.token_usage = completion.token_count;
                Ok(Stage::Generated)
            }
            Stage::Generated => {
                if let Verdict::Blocked { message } = self.guard.validate_output(&state.answer) {
                    // The refusal replaces the answer, and the turn is
                    // still recorded so the session sees what was said.
                    state.answer = message;
                    state.guardrails_passed = false;
                }
                Ok(Stage::OutputValidated)
            }
            Stage::OutputValidated => {
                if state.record_exchange
                    && let Err(e) = self
                        .memory
                        .append_exchange(&request.session_id, &request.query, &state.answer)
                        .await
                {
                    tracing::warn!(error = %e, "memory write failed, answer still returned");
                }
                Ok(Stage::MemoryWritten)
            }
            Stage::MemoryWritten | Stage::Done => Ok(Stage::Done),
        }
    }

    /// Drive a turn from `Received` to `Done`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Generation` when the completion call fails;
    /// every other failure degrades inside its transition.
    pub async fn submit_query(&self, request: QueryRequest) -> Result<QueryResult, QueryError> {
        let mut state = TurnState::new();
        let mut stage = Stage::Received;
        while stage != Stage::Done {
            stage = self.advance(stage, &request, &mut state).await?;
        }

        let sources = if state.context.is_empty() {
            None
        } else {
            Some(
                state
                    .context
                    .iter()
                    .map(|chunk| SourceRef {
                        document_id: chunk.document_id.clone(),
                        filename: chunk.source_filename.clone(),
                        chunk_index: chunk.chunk_index,
                        score: chunk.score,
                    })
                    .collect(),
            )
        };

        Ok(QueryResult {
            answer: state.answer,
            session_id: request.session_id,
            sources,
            guardrails_passed: state.guardrails_passed,
            token_usage: state.token_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpipe_guard::Guardrails;
    use ragpipe_llm::mock::{MockEmbedder, MockLlm};
    use ragpipe_memory::{InMemoryBackend, MemoryConfig};

    async fn orchestrator(llm: MockLlm) -> QueryOrchestrator {
        let index = DocumentIndex::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(MockEmbedder::new(8)),
        );
        let memory = SessionMemory::new(":memory:", MemoryConfig::default())
            .await
            .unwrap();
        QueryOrchestrator::new(
            Arc::new(llm),
            index,
            memory,
            Guardrails::default(),
            TurnSettings::default(),
        )
    }

    #[tokio::test]
    async fn clean_input_advances_to_input_validated() {
        let orch = orchestrator(MockLlm::new()).await;
        let request = QueryRequest::new("what is rust", "s1");
        let mut state = TurnState::new();
        let next = orch.advance(Stage::Received, &request, &mut state).await.unwrap();
        assert_eq!(next, Stage::InputValidated);
        assert!(state.guardrails_passed);
    }

    #[tokio::test]
    async fn blocked_input_short_circuits_to_done() {
        let orch = orchestrator(MockLlm::new()).await;
        let request = QueryRequest::new("my password is 12345", "s1");
        let mut state = TurnState::new();
        let next = orch.advance(Stage::Received, &request, &mut state).await.unwrap();
        assert_eq!(next, Stage::Done);
        assert!(!state.guardrails_passed);
        assert!(!state.record_exchange);
        assert!(!state.answer.is_empty());
    }

    #[tokio::test]
    async fn use_context_false_skips_retrieval() {
        let orch = orchestrator(MockLlm::new()).await;
        let request = QueryRequest {
            use_context: false,
            ..QueryRequest::new("hello", "s1")
        };
        let mut state = TurnState::new();
        let next = orch
            .advance(Stage::InputValidated, &request, &mut state)
            .await
            .unwrap();
        assert_eq!(next, Stage::ContextRetrieved);
        assert!(state.context.is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_empty_context() {
        let index = DocumentIndex::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(MockEmbedder::failing(8)),
        );
        let memory = SessionMemory::new(":memory:", MemoryConfig::default())
            .await
            .unwrap();
        let orch = QueryOrchestrator::new(
            Arc::new(MockLlm::new()),
            index,
            memory,
            Guardrails::default(),
            TurnSettings::default(),
        );

        let request = QueryRequest::new("hello", "s1");
        let mut state = TurnState::new();
        let next = orch
            .advance(Stage::InputValidated, &request, &mut state)
            .await
            .unwrap();
        assert_eq!(next, Stage::ContextRetrieved);
        assert!(state.context.is_empty());

        // The whole turn still succeeds.
        let result = orch.submit_query(QueryRequest::new("hello", "s1")).await.unwrap();
        assert!(result.guardrails_passed);
    }

    #[tokio::test]
    async fn generation_failure_is_fatal() {
        let orch = orchestrator(MockLlm::failing()).await;
        let result = orch.submit_query(QueryRequest::new("hello", "s1")).await;
        assert!(matches!(result, Err(QueryError::Generation(_))));
    }

    #[tokio::test]
    async fn blocked_output_is_replaced_but_recorded() {
        let orch =
            orchestrator(MockLlm::with_responses(["the password is hunter2"])).await;
        let result = orch
            .submit_query(QueryRequest::new("tell me something", "s1"))
            .await
            .unwrap();

        assert!(!result.guardrails_passed);
        assert!(!result.answer.contains("hunter2"));

        // The replaced refusal is what the session remembers.
        let orch_memory = orch.memory.get_exchanges("s1").await.unwrap();
        assert_eq!(orch_memory.len(), 1);
        assert_eq!(orch_memory[0].ai_text, result.answer);
    }

    #[tokio::test]
    async fn successful_turn_records_one_exchange() {
        let orch = orchestrator(MockLlm::with_responses(["a fine answer"])).await;
        let result = orch
            .submit_query(QueryRequest::new("what is rust", "s1"))
            .await
            .unwrap();

        assert_eq!(result.answer, "a fine answer");
        assert!(result.guardrails_passed);
        assert!(result.sources.is_none());
        assert_eq!(orch.memory.get_exchanges("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blocked_input_records_nothing() {
        let orch = orchestrator(MockLlm::new()).await;
        let result = orch
            .submit_query(QueryRequest::new("my password is 12345", "s1"))
            .await
            .unwrap();

        assert!(!result.guardrails_passed);
        assert!(result.sources.is_none());
        assert!(orch.memory.get_exchanges("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_flows_into_later_turns() {
        let orch = orchestrator(MockLlm::new()).await;
        orch.submit_query(QueryRequest::new("first question", "s1"))
            .await
            .unwrap();

        let request = QueryRequest::new("second question", "s1");
        let mut state = TurnState::new();
        orch.advance(Stage::ContextRetrieved, &request, &mut state)
            .await
            .unwrap();
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].content, "first question");
    }
}
