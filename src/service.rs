//! The assembled service shared by the HTTP server and the CLI.
//!
//! [`RagService`] owns one of each component: the static [`Config`], the
//! [`SettingsStore`], the guarded vector index, and both gateways. Every
//! operation reads a fresh settings snapshot, so updates apply to the next
//! request without a restart.

use std::sync::Arc;

use crate::answer::{self, AskOptions};
use crate::config::{Config, Settings, SettingsPatch, SettingsStore};
use crate::embedding::EmbeddingGateway;
use crate::error::Result;
use crate::generation::GenerationGateway;
use crate::ingest;
use crate::models::{Answer, CollectionStats, IngestReport, ScoredChunk};
use crate::store::sqlite::SqliteVectorIndex;
use crate::store::{IndexHandle, VectorIndex};

pub struct RagService {
    config: Config,
    settings: SettingsStore,
    index: IndexHandle,
    embeddings: EmbeddingGateway,
    generation: GenerationGateway,
}

impl RagService {
    /// Open the SQLite collection and settings file named by `config` and
    /// build the providers it selects.
    pub async fn open(config: Config) -> Result<Self> {
        let settings = SettingsStore::open(&config.settings.path)?;
        let index = SqliteVectorIndex::open(&config.db.path, &config.db.collection).await?;
        let embeddings = EmbeddingGateway::from_config(&config.embedding)?;
        let generation = GenerationGateway::from_config(&config.generation)?;

        tracing::info!(
            collection = %config.db.collection,
            embedding_model = embeddings.model_name(),
            generation_model = generation.model_name(),
            "service ready"
        );

        Ok(Self::new(
            config,
            settings,
            Arc::new(index),
            embeddings,
            generation,
        ))
    }

    /// Assemble from parts, e.g. an in-memory index and fake providers.
    pub fn new(
        config: Config,
        settings: SettingsStore,
        index: Arc<dyn VectorIndex>,
        embeddings: EmbeddingGateway,
        generation: GenerationGateway,
    ) -> Self {
        Self {
            config,
            settings,
            index: IndexHandle::new(index),
            embeddings,
            generation,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn collection_name(&self) -> &str {
        self.index.collection()
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        let updated = self.settings.update(patch)?;
        tracing::info!("settings updated");
        Ok(updated)
    }

    pub fn add_document_path(&self, path: &str) -> Result<Settings> {
        let updated = self.settings.add_document_path(path)?;
        tracing::info!(path, "document path added");
        Ok(updated)
    }

    /// Returns `false` if the path was not configured.
    pub fn remove_document_path(&self, path: &str) -> Result<bool> {
        let removed = self.settings.remove_document_path(path)?;
        if removed {
            tracing::info!(path, "document path removed");
        }
        Ok(removed)
    }

    /// Answer `question`; `None` arguments take the current settings.
    pub async fn ask(
        &self,
        question: &str,
        n_results: Option<usize>,
        use_augmentation: Option<bool>,
    ) -> Result<Answer> {
        let mut options = AskOptions::from_settings(&self.settings.snapshot());
        if let Some(n) = n_results {
            options.n_results = n;
        }
        if let Some(augment) = use_augmentation {
            options.use_augmentation = augment;
        }
        answer::answer(
            &self.index,
            &self.embeddings,
            &self.generation,
            question,
            options,
        )
        .await
    }

    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<ScoredChunk>> {
        let k = limit.unwrap_or_else(|| self.settings.snapshot().n_results);
        answer::search(&self.index, &self.embeddings, query, k).await
    }

    pub async fn reindex(&self) -> Result<IngestReport> {
        let settings = self.settings.snapshot();
        ingest::reindex(&self.index, &self.embeddings, &settings, &self.config.files).await
    }

    pub fn is_reindexing(&self) -> bool {
        self.index.is_rebuilding()
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            collection_name: self.index.collection().to_string(),
            total_chunks: self.index.count().await?,
            sources: self.index.sources().await?,
        })
    }
}
