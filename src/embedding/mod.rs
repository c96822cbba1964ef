//! Embedding providers and the gateway that batches and retries them.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: always fails; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls an OpenAI-compatible `/v1/embeddings` endpoint.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: runs models locally via fastembed (`local-embeddings` feature).
//!
//! [`EmbeddingGateway`] is what the rest of the crate talks to. It splits
//! input into batches, runs each batch under the shared
//! [`RetryPolicy`](crate::retry::RetryPolicy), checks the shape of what came
//! back, and turns a failed call into [`RagError::EmbeddingUnavailable`].
//! A call either returns every vector or none.
//!
//! Also provides vector utilities used by the index:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Provider Selection
//!
//! ```rust
//! # use rag_mind::config::EmbeddingConfig;
//! # use rag_mind::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::retry::{CallError, RetryPolicy};

/// A backend that turns texts into vectors.
///
/// Implementations make exactly one attempt per call and classify failures
/// as transient or permanent; retrying is the gateway's job.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Expected dimensionality, when known up front.
    fn dims(&self) -> Option<usize>;
    /// Embed one batch. Must return one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, CallError>;
}

// ============ Disabled ============

/// An embedder that refuses every call.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> Option<usize> {
        None
    }
    async fn embed(&self, _texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, CallError> {
        Err(CallError::Permanent(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI-compatible ============

/// Embedder for the OpenAI embeddings API and compatible servers.
///
/// Posts `{"model", "input"}` to `{url}/v1/embeddings` with a bearer token
/// read from the configured environment variable (`OPENAI_API_KEY` by default).
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
    api_key: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::config("embedding.model required for OpenAI provider"))?;
        let key_env = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = std::env::var(key_env)
            .map_err(|_| RagError::config(format!("{} environment variable not set", key_env)))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: url.trim_end_matches('/').to_string(),
            model,
            dims: config.dims,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, CallError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::from_reqwest("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status("OpenAI", status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallError::from_reqwest("OpenAI", e))?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> std::result::Result<Vec<Vec<f32>>, CallError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| CallError::Permanent("Invalid OpenAI response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (i, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(i);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| CallError::Permanent("Invalid OpenAI response: missing embedding".into()))?;
        indexed.push((index, parse_vector(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::config("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: url.trim_end_matches('/').to_string(),
            model,
            dims: config.dims,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, CallError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CallError::Transient(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status("Ollama", status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallError::from_reqwest("Ollama", e))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> std::result::Result<Vec<Vec<f32>>, CallError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            CallError::Permanent("Invalid Ollama response: missing embeddings array".into())
        })?
        .iter()
        .map(parse_vector)
        .collect()
}

fn parse_vector(value: &serde_json::Value) -> std::result::Result<Vec<f32>, CallError> {
    value
        .as_array()
        .ok_or_else(|| CallError::Permanent("Invalid response: embedding is not an array".into()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| CallError::Permanent("Invalid response: non-numeric embedding".into()))
        })
        .collect()
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))
}

// ============ Local (fastembed) ============

/// Embedder running a model in-process with fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached; after
/// that no network calls are made. Inference runs on the blocking pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "bge-small-en-v1.5".to_string());
        // Reject unknown names at startup rather than on the first embed.
        to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or(match model_name.as_str() {
            "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            _ => 384,
        });

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(RagError::config(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> Option<usize> {
        Some(self.dims)
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, CallError> {
        let kind = to_fastembed_model(&self.model_name)
            .map_err(|e| CallError::Permanent(e.to_string()))?;
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut slot = model.lock().unwrap_or_else(|e| e.into_inner());
            let mut embedding = match slot.take() {
                Some(m) => m,
                None => fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(kind).with_show_download_progress(false),
                )
                .map_err(|e| {
                    CallError::Permanent(format!("Failed to initialize local embedding model: {}", e))
                })?,
            };
            let result = embedding
                .embed(texts, Some(batch_size))
                .map_err(|e| CallError::Permanent(format!("Local embedding failed: {}", e)));
            *slot = Some(embedding);
            result
        })
        .await
        .map_err(|e| CallError::Permanent(format!("Local embedding task failed: {}", e)))?
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires the `local-embeddings` feature) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(RagError::config(
            "Local embedding provider requires building with --features local-embeddings",
        )),
        other => Err(RagError::config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Gateway ============

/// Batched, retried access to an [`Embedder`].
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, policy: RetryPolicy, batch_size: usize) -> Self {
        Self {
            embedder,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_secs(config.timeout_secs),
        );
        Ok(Self::new(
            create_embedder(config)?,
            policy,
            config.batch_size,
        ))
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed `texts`, returning one vector per input in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedder = &self.embedder;
            let batch_vectors = self
                .policy
                .run("embedding", move || async move {
                    let vectors = embedder.embed(batch).await?;
                    check_batch(batch.len(), embedder.dims(), vectors)
                })
                .await
                .map_err(|e| RagError::EmbeddingUnavailable {
                    attempts: e.attempts,
                    message: e.last_error,
                })?;

            tracing::debug!(batch = i, size = batch.len(), "embedded batch");
            vectors.extend(batch_vectors);
        }

        Ok(vectors)
    }

    /// Embed a single text, e.g. a question.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingUnavailable {
                attempts: 1,
                message: "empty embedding response".to_string(),
            })
    }
}

/// Reject responses with the wrong number or shape of vectors.
fn check_batch(
    expected: usize,
    dims: Option<usize>,
    vectors: Vec<Vec<f32>>,
) -> std::result::Result<Vec<Vec<f32>>, CallError> {
    if vectors.len() != expected {
        return Err(CallError::Permanent(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    let width = dims.or_else(|| vectors.first().map(|v| v.len()));
    if let Some(width) = width {
        if width == 0 || vectors.iter().any(|v| v.len() != width) {
            return Err(CallError::Permanent(format!(
                "embeddings do not all have {} dimensions",
                width
            )));
        }
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(CallError::Permanent(
            "embedding contains a non-finite value".to_string(),
        ));
    }
    Ok(vectors)
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use rag_mind::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
