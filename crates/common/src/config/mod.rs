//! Configuration management for RagChat services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Legacy deployment variables (PORT, GEMINI_API_KEY, ...)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Completion (language model) provider configuration
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector_index: VectorIndexConfig,

    /// Retrieval and context assembly
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation history
    #[serde(default)]
    pub session: SessionConfig,

    /// Ingestion job configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: gemini, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// Completion provider: gemini
    #[serde(default = "default_completion_provider")]
    pub provider: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorIndexConfig {
    /// Index provider: pinecone
    #[serde(default = "default_index_provider")]
    pub provider: String,

    /// API key for the index service
    pub api_key: Option<String>,

    /// Index name (used to resolve the data-plane host)
    pub index_name: Option<String>,

    /// Data-plane host; resolved from the control plane when absent
    pub host: Option<String>,

    /// Control-plane base URL
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    /// Optional namespace inside the index
    pub namespace: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Number of nearest chunks to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Character budget for the assembled context (0 disables the cap)
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Turns kept per session (0 keeps everything)
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Source document to index
    #[serde(default = "default_source_path")]
    pub source_path: String,

    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Vectors per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Concurrent upsert requests
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (debug, info, ragchat_common=debug, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_embedding_provider() -> String { "gemini".to_string() }
fn default_embedding_model() -> String { "text-embedding-004".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_provider_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }
fn default_completion_provider() -> String { "gemini".to_string() }
fn default_completion_model() -> String { "gemini-2.0-flash".to_string() }
fn default_index_provider() -> String { "pinecone".to_string() }
fn default_control_plane_url() -> String { "https://api.pinecone.io".to_string() }
fn default_top_k() -> usize { 10 }
fn default_max_context_chars() -> usize { 12_000 }
fn default_max_history_turns() -> usize { 40 }
fn default_source_path() -> String { "./dsa.pdf".to_string() }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_upsert_batch_size() -> usize { 100 }
fn default_max_concurrency() -> usize { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "ragchat".to_string() }

/// Legacy deployment variables, mapped onto config keys
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("GEMINI_API_KEY", "embedding.api_key"),
    ("GEMINI_API_KEY", "completion.api_key"),
    ("PINECONE_API_KEY", "vector_index.api_key"),
    ("PINECONE_INDEX_NAME", "vector_index.index_name"),
    ("CHUNK_SIZE", "ingestion.chunk_size"),
    ("CHUNK_OVERLAP", "ingestion.chunk_overlap"),
];

impl AppConfig {
    /// Load configuration from `.env`, files and environment
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would only fail later at request time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Message("retrieval.top_k must be at least 1".into()));
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(ConfigError::Message(format!(
                "ingestion.chunk_overlap ({}) must be smaller than ingestion.chunk_size ({})",
                self.ingestion.chunk_overlap, self.ingestion.chunk_size
            )));
        }
        if self.embedding.provider == "gemini" && self.embedding.api_key.is_none() {
            return Err(ConfigError::Message("embedding.api_key is required for gemini".into()));
        }
        if self.completion.provider == "gemini" && self.completion.api_key.is_none() {
            return Err(ConfigError::Message("completion.api_key is required for gemini".into()));
        }
        if self.vector_index.provider != "pinecone" {
            // The in-memory index lives in one process and ingestion runs in another
            return Err(ConfigError::Message(format!(
                "vector_index.provider must be pinecone, got {}",
                self.vector_index.provider
            )));
        }
        if self.vector_index.api_key.is_none() {
            return Err(ConfigError::Message(
                "vector_index.api_key is required for pinecone".into(),
            ));
        }
        if self.vector_index.host.is_none() && self.vector_index.index_name.is_none() {
            return Err(ConfigError::Message(
                "vector_index.host or vector_index.index_name is required for pinecone".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_provider_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            api_key: None,
            api_base: None,
            model: default_completion_model(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            api_key: None,
            index_name: None,
            host: None,
            control_plane_url: default_control_plane_url(),
            namespace: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            upsert_batch_size: default_upsert_batch_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            vector_index: VectorIndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            ingestion: IngestionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
