#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rag_mind::config::{Config, SettingsStore};
use rag_mind::embedding::{Embedder, EmbeddingGateway};
use rag_mind::generation::{ChatMessage, CompletionRequest, GenerationGateway, Generator};
use rag_mind::retry::{CallError, RetryPolicy};
use rag_mind::service::RagService;
use rag_mind::store::sqlite::SqliteVectorIndex;

pub const DIMS: usize = 256;

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// [`DIMS`] buckets, so texts sharing words score close together.
pub struct HashEmbedder {
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub down: bool,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            down: false,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn down() -> Self {
        Self {
            down: true,
            ..Self::new()
        }
    }
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h: u32 = 2166136261;
        for b in word.to_lowercase().bytes() {
            h ^= b as u32;
            h = h.wrapping_mul(16777619);
        }
        v[(h as usize) % DIMS] += 1.0;
    }
    // Keep blank-ish text off the zero vector.
    v[0] += 0.01;
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> Option<usize> {
        Some(DIMS)
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.down {
            return Err(CallError::Transient("503 Service Unavailable".into()));
        }
        Ok(texts.iter().map(|t| embed_words(t)).collect())
    }
}

/// Records every request and answers with a fixed string.
pub struct RecordingGenerator {
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    /// Fail requests that carry a system message (query expansion).
    pub fail_expansion: bool,
    pub down: bool,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_expansion: false,
            down: false,
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_user_prompt(&self) -> String {
        self.requests()
            .last()
            .and_then(|msgs| msgs.iter().rev().find(|m| m.role == "user").cloned())
            .map(|m| m.content)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError> {
        self.requests.lock().unwrap().push(request.messages.clone());
        if self.down {
            return Err(CallError::Transient("504 Gateway Timeout".into()));
        }
        if self.fail_expansion && request.messages.iter().any(|m| m.role == "system") {
            return Err(CallError::Permanent("400 Bad Request".into()));
        }
        if request.messages.iter().any(|m| m.role == "system") {
            return Ok("kubernetes clusters".to_string());
        }
        Ok("stub answer".to_string())
    }
}

pub fn test_config(root: &Path) -> Config {
    let toml_src = format!(
        r#"[db]
path = "{root}/data/rag.sqlite"

[settings]
path = "{root}/data/settings.json"
"#,
        root = root.display()
    );
    toml::from_str(&toml_src).unwrap()
}

/// Write a settings file with exactly `paths` configured.
pub fn write_settings(config: &Config, paths: &[&Path]) {
    std::fs::create_dir_all(config.settings.path.parent().unwrap()).unwrap();
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    let json = serde_json::json!({ "document_paths": paths });
    std::fs::write(&config.settings.path, json.to_string()).unwrap();
}

pub fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_secs(10))
}

/// A service over a SQLite collection in `root` with the given fakes.
pub async fn build_service(
    root: &Path,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
) -> RagService {
    let config = test_config(root);
    if !config.settings.path.exists() {
        write_settings(&config, &[]);
    }
    let settings = SettingsStore::open(&config.settings.path).unwrap();
    let index = SqliteVectorIndex::open(&config.db.path, &config.db.collection)
        .await
        .unwrap();
    let embeddings = EmbeddingGateway::new(embedder, fast_policy(3), 32);
    let generation = GenerationGateway::new(generator, fast_policy(2), 500, 0.7);
    RagService::new(config, settings, Arc::new(index), embeddings, generation)
}

/// `n` whitespace-separated words totalling exactly `5 * n` characters.
pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{:03} ", i % 1000)).collect()
}
