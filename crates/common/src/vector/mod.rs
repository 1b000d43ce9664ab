//! Vector index abstraction
//!
//! Provides nearest-neighbour search over chunk embeddings:
//! - Pinecone (REST data plane)
//! - In-memory cosine index for offline runs and tests

use crate::config::VectorIndexConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Metadata key holding a chunk's text
pub const TEXT_METADATA_KEY: &str = "text";

const PINECONE_API_VERSION: &str = "2024-07";

/// A ranked hit returned by [`VectorIndex::query`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl VectorMatch {
    /// The chunk text stored by the ingestion job, if present
    pub fn text(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(TEXT_METADATA_KEY))
            .and_then(Value::as_str)
    }
}

/// A vector with its metadata, as written by ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// Record whose metadata carries only the chunk text
    pub fn with_text(id: impl Into<String>, values: Vec<f32>, text: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(TEXT_METADATA_KEY.to_string(), Value::String(text.into()));
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

/// Trait for similarity search over stored chunk vectors
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` matches ordered by descending similarity
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>>;

    /// Insert or replace records by id, returning the number written
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Pinecone data-plane client
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    host: String,
    namespace: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeIndex {
    /// Connect to the index, resolving its host by name when not configured
    pub async fn connect(config: &VectorIndexConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "vector_index.api_key is required for the pinecone provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let host = match (&config.host, &config.index_name) {
            (Some(host), _) => host.clone(),
            (None, Some(name)) => {
                Self::describe_host(&client, &config.control_plane_url, &api_key, name).await?
            }
            (None, None) => {
                return Err(AppError::Configuration {
                    message: "vector_index.host or vector_index.index_name is required".to_string(),
                })
            }
        };

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        tracing::info!(host = %host, "Pinecone index connected");

        Ok(Self {
            client,
            api_key,
            host: host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
        })
    }

    async fn describe_host(
        client: &reqwest::Client,
        control_plane_url: &str,
        api_key: &str,
        index_name: &str,
    ) -> Result<String> {
        let url = format!("{}/indexes/{}", control_plane_url.trim_end_matches('/'), index_name);

        let response = client
            .get(&url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Describe index failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndex {
                message: format!("Describe index {} failed with {}: {}", index_name, status, body),
            });
        }

        let described: DescribeIndexResponse =
            response.json().await.map_err(|e| AppError::VectorIndex {
                message: format!("Failed to parse index description: {}", e),
            })?;
        Ok(described.host)
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::VectorIndex {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorIndex {
                message: format!("API error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::VectorIndex {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self.post("/query", &request).await?;
        Ok(response.matches)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let request = UpsertRequest {
            vectors: &records,
            namespace: self.namespace.as_deref(),
        };
        let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
        Ok(response.upserted_count)
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

/// Brute-force cosine index held in memory
///
/// Not selectable through configuration: the gateway and the ingestion job
/// are separate processes, so it is only useful when the caller fills it
/// in-process.
#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let records = self.records.read().await;

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .filter_map(|record| {
                cosine_similarity(vector, &record.values).map(|score| VectorMatch {
                    id: record.id.clone(),
                    score,
                    metadata: include_metadata.then(|| record.metadata.clone()),
                })
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut stored = self.records.write().await;
        let written = records.len();

        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(written)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Some(0.0);
    }
    Some((dot / denom) as f32)
}

/// Create a vector index based on configuration
pub async fn create_vector_index(config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::connect(config).await?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown vector index provider: {}", other),
        }),
    }
}
