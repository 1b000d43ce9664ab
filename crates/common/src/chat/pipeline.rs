//! Chat Pipeline - Per-request orchestration
//!
//! Sequences rewrite → retrieve → assemble → generate for one question while
//! holding the session's lock, and folds every failure into a
//! [`PipelineOutcome`] carrying only a human-readable message.

use super::assembler::ContextAssembler;
use super::generator::AnswerGenerator;
use super::retriever::Retriever;
use super::rewriter::QueryRewriter;
use super::session::{SessionGuard, SessionStore};
use crate::completion::{create_completion_provider, CompletionProvider};
use crate::config::AppConfig;
use crate::embeddings::{create_embedder, Embedder};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::vector::{create_vector_index, VectorIndex};
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Position of a request in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Rewriting,
    Retrieving,
    Assembling,
    Generating,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Start => "start",
            PipelineStage::Rewriting => "rewriting",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Generating => "generating",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one request
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Reached `Done` with an answer
    Answered { answer: String },

    /// Stopped at `stage` with a message safe to show the client
    Failed { stage: PipelineStage, error: String },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Answered { .. })
    }
}

/// The conversational retrieval pipeline
pub struct ChatPipeline {
    sessions: Arc<SessionStore>,
    rewriter: QueryRewriter,
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: AnswerGenerator,
}

impl ChatPipeline {
    /// Wire a pipeline from already-built providers
    pub fn new(
        sessions: Arc<SessionStore>,
        completion: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            sessions,
            rewriter: QueryRewriter::new(Arc::clone(&completion)),
            retriever: Retriever::new(embedder, index, top_k),
            assembler: ContextAssembler::new(max_context_chars),
            generator: AnswerGenerator::new(completion),
        }
    }

    /// Build providers and the session store from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let completion = create_completion_provider(&config.completion)?;
        let embedder = create_embedder(&config.embedding)?;
        let index = create_vector_index(&config.vector_index).await?;

        info!(
            completion = completion.model_name(),
            embedding = embedder.model_name(),
            index = index.name(),
            top_k = config.retrieval.top_k,
            "Chat pipeline initialised"
        );

        Ok(Self::new(
            Arc::new(SessionStore::new(config.session.max_history_turns)),
            completion,
            embedder,
            index,
            config.retrieval.top_k,
            config.retrieval.max_context_chars,
        ))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer `question` within `session_id`'s conversation
    pub async fn handle(&self, question: &str, session_id: &str) -> PipelineOutcome {
        if question.is_empty() {
            return PipelineOutcome::Failed {
                stage: PipelineStage::Start,
                error: "Message is required".to_string(),
            };
        }

        let mut session = self.sessions.lock(session_id).await;
        metrics::record_sessions(self.sessions.session_count());

        let mut stage = PipelineStage::Start;
        let result = AssertUnwindSafe(self.run(question, &mut session, &mut stage))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(answer)) => {
                info!(session_id = %session_id, history = session.history().len(), "Question answered");
                PipelineOutcome::Answered { answer }
            }
            Ok(Err(err)) => {
                error!(
                    session_id = %session_id,
                    stage = %stage,
                    upstream = err.is_upstream(),
                    error = ?err,
                    "Chat pipeline failed"
                );
                PipelineOutcome::Failed {
                    stage,
                    error: err.to_string(),
                }
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(session_id = %session_id, stage = %stage, panic = %detail, "Chat pipeline panicked");
                PipelineOutcome::Failed {
                    stage,
                    error: AppError::Internal {
                        message: "unexpected failure while answering".to_string(),
                    }
                    .to_string(),
                }
            }
        }
    }

    async fn run(
        &self,
        question: &str,
        session: &mut SessionGuard,
        stage: &mut PipelineStage,
    ) -> Result<String> {
        let session_id = session.session_id().to_string();

        let query = timed(stage, PipelineStage::Rewriting, &session_id, async {
            self.rewriter.rewrite(question, session.history()).await
        })
        .await?;

        let chunks = timed(stage, PipelineStage::Retrieving, &session_id, async {
            self.retriever.retrieve(&query).await
        })
        .await?;

        let context = timed(stage, PipelineStage::Assembling, &session_id, async {
            Ok(self.assembler.assemble(&chunks))
        })
        .await?;

        let answer = timed(stage, PipelineStage::Generating, &session_id, async {
            self.generator.generate(&query, &context.text, session).await
        })
        .await?;

        *stage = PipelineStage::Done;
        debug!(session_id = %session_id, stage = %stage, chunks = context.chunks_used, "Pipeline finished");
        Ok(answer)
    }
}

/// Enter `next`, run it, and record its latency
async fn timed<T>(
    stage: &mut PipelineStage,
    next: PipelineStage,
    session_id: &str,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    *stage = next;
    debug!(session_id = %session_id, stage = %next, "Stage started");

    let start = Instant::now();
    let result = fut.await;
    metrics::record_stage(next.as_str(), start.elapsed().as_secs_f64(), result.is_ok());
    result
}
