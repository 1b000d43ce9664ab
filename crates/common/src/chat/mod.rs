//! Conversational Retrieval Pipeline
//!
//! Answers questions about the indexed document while keeping per-session
//! conversation history:
//! - Session history store with per-session serialisation
//! - Follow-up rewriting into a standalone query
//! - Embedding + vector retrieval
//! - Context assembly under a character budget
//! - Grounded answer generation

mod assembler;
mod generator;
mod pipeline;
mod retriever;
mod rewriter;
mod session;

pub use assembler::{AssembledContext, ContextAssembler, CHUNK_SEPARATOR};
pub use generator::{AnswerGenerator, ANSWER_INSTRUCTION, CONTEXT_HEADER, FALLBACK_ANSWER};
pub use pipeline::{ChatPipeline, PipelineOutcome, PipelineStage};
pub use retriever::{RetrievedChunk, Retriever};
pub use rewriter::{QueryRewriter, REWRITE_INSTRUCTION};
pub use session::{Role, SessionGuard, SessionStore, Turn};
