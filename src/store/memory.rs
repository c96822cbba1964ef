//! In-memory [`VectorIndex`] backed by a `BTreeMap`.
//!
//! Nothing is persisted. Useful for tests and for running the pipeline
//! without touching disk.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{check_dims, check_query, rank, VectorIndex};
use crate::embedding::cosine_similarity;
use crate::error::Result;
use crate::models::{EmbeddingRecord, ScoredChunk, SourceSummary};

#[derive(Default)]
struct State {
    records: BTreeMap<String, EmbeddingRecord>,
    dims: Option<usize>,
}

pub struct InMemoryVectorIndex {
    collection: String,
    state: RwLock<State>,
}

impl InMemoryVectorIndex {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let mut state = self.write();
        let dims = check_dims(records, state.dims)?;
        state.dims = dims;
        for record in records {
            state
                .records
                .insert(record.chunk_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64> {
        let mut state = self.write();
        let before = state.records.len();
        state.records.retain(|_, r| r.source_id != source_id);
        Ok((before - state.records.len()) as u64)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let state = self.read();
        check_query(vector, k, state.dims)?;
        let hits = state
            .records
            .values()
            .map(|r| ScoredChunk {
                chunk_id: r.chunk_id.clone(),
                source_id: r.source_id.clone(),
                source_path: r.source_path.clone(),
                position: r.position,
                text: r.text.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();
        Ok(rank(hits, k))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read().records.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.write();
        state.records.clear();
        state.dims = None;
        Ok(())
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>> {
        let state = self.read();
        let mut by_source: HashMap<&str, SourceSummary> = HashMap::new();
        for r in state.records.values() {
            let entry = by_source
                .entry(r.source_id.as_str())
                .or_insert_with(|| SourceSummary {
                    source_id: r.source_id.clone(),
                    source_path: r.source_path.clone(),
                    chunk_count: 0,
                });
            entry.chunk_count += 1;
        }
        let mut summaries: Vec<SourceSummary> = by_source.into_values().collect();
        summaries.sort_by(|a, b| {
            a.source_path
                .cmp(&b.source_path)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        Ok(summaries)
    }
}
