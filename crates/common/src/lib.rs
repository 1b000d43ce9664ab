//! RagChat Common Library
//!
//! Shared code for the RagChat services including:
//! - The conversational retrieval pipeline (sessions, rewriting, retrieval,
//!   context assembly, grounded answering)
//! - Provider seams for embeddings, completions and the vector index
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod chat;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod vector;

// Re-export commonly used types
pub use chat::{ChatPipeline, PipelineOutcome, Role, SessionStore, Turn};
pub use completion::CompletionProvider;
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use vector::VectorIndex;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
