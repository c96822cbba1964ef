//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage contract of a collection of
//! embedded chunks: idempotent upsert, delete-by-source, k-nearest-neighbor
//! query, count, and clear. Two backends implement it:
//!
//! - [`sqlite::SqliteVectorIndex`]: persistent, used by the service.
//! - [`memory::InMemoryVectorIndex`]: for tests and throwaway runs.
//!
//! [`IndexHandle`] wraps a backend with the locking the service needs: many
//! concurrent readers, one rebuild at a time, and readers never observing a
//! rebuild half-way.
//!
//! # Ranking
//!
//! Queries score every stored vector by cosine similarity and return the top
//! `k` in descending score order. Equal scores are ordered by chunk ID
//! ascending, so results are deterministic.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use crate::error::{RagError, Result};
use crate::models::{EmbeddingRecord, ScoredChunk, SourceSummary};

/// Storage contract of one named collection.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace records by chunk ID |
/// | [`delete_by_source`](VectorIndex::delete_by_source) | Drop every chunk of a source |
/// | [`query`](VectorIndex::query) | Top-`k` records by cosine similarity |
/// | [`count`](VectorIndex::count) | Number of stored chunks |
/// | [`clear`](VectorIndex::clear) | Remove everything |
/// | [`sources`](VectorIndex::sources) | Per-source chunk counts |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index serves.
    fn collection(&self) -> &str;

    /// Insert or replace records, keyed by chunk ID. All-or-nothing.
    ///
    /// Every vector must have the collection's dimensionality; the first
    /// upsert into an empty collection fixes it.
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()>;

    /// Remove every chunk of `source_id`. Returns how many were removed.
    async fn delete_by_source(&self, source_id: &str) -> Result<u64>;

    /// Return at most `k` records ranked by similarity to `vector`.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<u64>;

    /// Remove all records and forget the collection's dimensionality.
    async fn clear(&self) -> Result<()>;

    async fn sources(&self) -> Result<Vec<SourceSummary>>;
}

/// Check a batch of records against the collection's dimensionality.
///
/// Returns the batch's dimensionality (`None` for an empty batch).
pub(crate) fn check_dims(records: &[EmbeddingRecord], dims: Option<usize>) -> Result<Option<usize>> {
    let Some(first) = records.first() else {
        return Ok(dims);
    };
    let batch_dims = first.vector.len();
    if batch_dims == 0 {
        return Err(RagError::invalid(format!(
            "empty vector for chunk {}",
            first.chunk_id
        )));
    }
    if let Some(r) = records.iter().find(|r| r.vector.len() != batch_dims) {
        return Err(RagError::invalid(format!(
            "chunk {} has {} dimensions, expected {}",
            r.chunk_id,
            r.vector.len(),
            batch_dims
        )));
    }
    if let Some(expected) = dims {
        if expected != batch_dims {
            return Err(RagError::invalid(format!(
                "collection has {} dimensions, records have {}",
                expected, batch_dims
            )));
        }
    }
    Ok(Some(batch_dims))
}

/// Validate query arguments against the collection's dimensionality.
pub(crate) fn check_query(vector: &[f32], k: usize, dims: Option<usize>) -> Result<()> {
    if k == 0 {
        return Err(RagError::invalid("k must be > 0"));
    }
    if vector.is_empty() {
        return Err(RagError::invalid("query vector must not be empty"));
    }
    if let Some(expected) = dims {
        if expected != vector.len() {
            return Err(RagError::invalid(format!(
                "query has {} dimensions, collection has {}",
                vector.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Sort by score descending, then chunk ID ascending, and keep the top `k`.
/// A NaN score ranks below every number.
pub(crate) fn rank(mut hits: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    hits.sort_by(|a, b| {
        key(b.score)
            .total_cmp(&key(a.score))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    hits.truncate(k);
    hits
}

/// A [`VectorIndex`] guarded for concurrent use.
///
/// Reads share a gate. A rebuild first takes the rebuild mutex without
/// waiting (a second rebuild fails with [`RagError::IngestionInProgress`]),
/// then the gate exclusively, so queries wait for the rebuild to finish
/// instead of seeing a partially cleared collection.
pub struct IndexHandle {
    index: Arc<dyn VectorIndex>,
    gate: RwLock<()>,
    rebuild: Mutex<()>,
}

impl IndexHandle {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            gate: RwLock::new(()),
            rebuild: Mutex::new(()),
        }
    }

    pub fn collection(&self) -> &str {
        self.index.collection()
    }

    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let _read = self.gate.read().await;
        self.index.query(vector, k).await
    }

    pub async fn count(&self) -> Result<u64> {
        let _read = self.gate.read().await;
        self.index.count().await
    }

    pub async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let _read = self.gate.read().await;
        self.index.sources().await
    }

    /// Start an exclusive rebuild, or fail at once if one is running.
    pub async fn begin_rebuild(&self) -> Result<Rebuild<'_>> {
        let exclusive = self
            .rebuild
            .try_lock()
            .map_err(|_| RagError::IngestionInProgress)?;
        let write = self.gate.write().await;
        Ok(Rebuild {
            index: self.index.as_ref(),
            _write: write,
            _exclusive: exclusive,
        })
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuild.try_lock().is_err()
    }
}

/// Exclusive write access to the index for the duration of a rebuild.
pub struct Rebuild<'a> {
    index: &'a dyn VectorIndex,
    _write: RwLockWriteGuard<'a, ()>,
    _exclusive: MutexGuard<'a, ()>,
}

impl Rebuild<'_> {
    pub fn index(&self) -> &dyn VectorIndex {
        self.index
    }
}
