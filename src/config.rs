//! Configuration.
//!
//! Two layers:
//!
//! - [`Config`]: static TOML configuration read once at startup (database,
//!   collection name, external providers, server bind address).
//! - [`Settings`]: runtime settings that the HTTP API can change (chunking,
//!   retrieval fan-out, document paths). [`SettingsStore`] is their single
//!   owner: it loads them from JSON, validates every update, and persists it
//!   before returning. Operations receive a [`Settings`] snapshot explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::chunk::ChunkParams;
use crate::error::{self, RagError};

/// Commented starting configuration, written by `ragmind init`.
pub const EXAMPLE_CONFIG: &str = include_str!("../config/ragmind.example.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub settings: SettingsFileConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "rag_collection".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettingsFileConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

impl Default for SettingsFileConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./data/settings.json")
}

/// Which files under the document paths are ingested.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Expected vector length. When unset, the first response decides.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL of the provider's API.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
    /// Total attempts per batch, including the first.
    #[serde(default = "default_embedding_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_embedding_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_embedding_batch_size(),
            max_attempts: default_embedding_attempts(),
            timeout_secs: default_embedding_timeout_secs(),
            initial_backoff_ms: default_embedding_backoff_ms(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_embedding_batch_size() -> usize {
    32
}
fn default_embedding_attempts() -> u32 {
    3
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_embedding_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Total attempts per completion: the first call plus one retry.
    #[serde(default = "default_generation_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_attempts: default_generation_attempts(),
            timeout_secs: default_generation_timeout_secs(),
            initial_backoff_ms: default_generation_backoff_ms(),
        }
    }
}

fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}
fn default_generation_attempts() -> u32 {
    2
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_generation_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.db.collection.trim().is_empty() {
        anyhow::bail!("db.collection must not be empty");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "huggingface" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                anyhow::bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, huggingface, openai, or ollama.",
            other
        ),
    }

    Ok(())
}

// ============ Runtime settings ============

/// Settings the API can read and update at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub document_paths: Vec<String>,
    pub n_results: usize,
    pub use_augmentation: bool,
    /// Retrieve with a model-written hypothetical answer appended to the question.
    pub query_expansion: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub tokens_per_chunk: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document_paths: vec!["./docs".to_string()],
            n_results: 5,
            use_augmentation: true,
            query_expansion: false,
            chunk_size: 1000,
            chunk_overlap: 100,
            tokens_per_chunk: 256,
        }
    }
}

impl Settings {
    pub fn chunk_params(&self) -> error::Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.chunk_overlap, self.tokens_per_chunk)
    }

    pub fn validate(&self) -> error::Result<()> {
        self.chunk_params()?;
        if self.n_results == 0 {
            return Err(RagError::config("n_results must be > 0"));
        }
        for (i, path) in self.document_paths.iter().enumerate() {
            if path.trim().is_empty() {
                return Err(RagError::config("document paths must not be empty"));
            }
            if self.document_paths[..i].iter().any(|p| same_path(p, path)) {
                return Err(RagError::config(format!(
                    "duplicate document path: '{}'",
                    path
                )));
            }
        }
        Ok(())
    }

    /// Apply a partial update; fields absent from `patch` keep their value.
    pub fn apply(&self, patch: &SettingsPatch) -> Settings {
        let mut next = self.clone();
        if let Some(ref paths) = patch.document_paths {
            next.document_paths = paths.clone();
        }
        if let Some(v) = patch.n_results {
            next.n_results = v;
        }
        if let Some(v) = patch.use_augmentation {
            next.use_augmentation = v;
        }
        if let Some(v) = patch.query_expansion {
            next.query_expansion = v;
        }
        if let Some(v) = patch.chunk_size {
            next.chunk_size = v;
        }
        if let Some(v) = patch.chunk_overlap {
            next.chunk_overlap = v;
        }
        if let Some(v) = patch.tokens_per_chunk {
            next.tokens_per_chunk = v;
        }
        next
    }
}

/// Partial settings update, as accepted by `POST /api/settings`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    pub document_paths: Option<Vec<String>>,
    pub n_results: Option<usize>,
    pub use_augmentation: Option<bool>,
    pub query_expansion: Option<bool>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub tokens_per_chunk: Option<usize>,
}

/// Compare two configured paths, ignoring trailing separators and, when both
/// exist, resolving them to their canonical form.
fn same_path(a: &str, b: &str) -> bool {
    let trim = |s: &str| s.trim_end_matches(['/', '\\']).to_string();
    if trim(a) == trim(b) {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// Single owner of the persisted runtime [`Settings`].
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Load settings from `path`, creating the file with defaults if missing.
    ///
    /// An unparsable or invalid file is a configuration error rather than
    /// being silently replaced.
    pub fn open(path: &Path) -> error::Result<Self> {
        let settings = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Settings = serde_json::from_str(&content).map_err(|e| {
                RagError::config(format!("cannot parse {}: {}", path.display(), e))
            })?;
            settings.validate()?;
            settings
        } else {
            let settings = Settings::default();
            persist(path, &settings)?;
            tracing::info!(path = %path.display(), "created default settings file");
            settings
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.lock().clone()
    }

    /// Validate, persist, and then publish a partial update.
    pub fn update(&self, patch: &SettingsPatch) -> error::Result<Settings> {
        let mut current = self.lock();
        let next = current.apply(patch);
        next.validate()?;
        persist(&self.path, &next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Append a document path. It must exist, be a directory, and not
    /// already be configured.
    pub fn add_document_path(&self, path: &str) -> error::Result<Settings> {
        let path = path.trim();
        if path.is_empty() {
            return Err(RagError::invalid("path must not be empty"));
        }
        let meta = std::fs::metadata(path)
            .map_err(|_| RagError::invalid(format!("path does not exist: '{}'", path)))?;
        if !meta.is_dir() {
            return Err(RagError::invalid(format!(
                "path is not a directory: '{}'",
                path
            )));
        }

        let mut current = self.lock();
        if current.document_paths.iter().any(|p| same_path(p, path)) {
            return Err(RagError::invalid(format!(
                "document path already configured: '{}'",
                path
            )));
        }
        let mut next = current.clone();
        next.document_paths.push(path.to_string());
        persist(&self.path, &next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Remove a document path. Returns `false` if it was not configured.
    pub fn remove_document_path(&self, path: &str) -> error::Result<bool> {
        let mut current = self.lock();
        let Some(index) = current
            .document_paths
            .iter()
            .position(|p| same_path(p, path.trim()))
        else {
            return Ok(false);
        };
        let mut next = current.clone();
        next.document_paths.remove(index);
        persist(&self.path, &next)?;
        *current = next;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Write settings atomically: temp file in the same directory, then rename.
fn persist(path: &Path, settings: &Settings) -> error::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(settings)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
