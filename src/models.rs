//! Core data models used throughout RAG Mind.
//!
//! These types represent the sources, chunks, and retrieval results that flow
//! through the ingestion and answering pipeline.

use serde::Serialize;
use std::path::PathBuf;

/// A file discovered under one of the configured document paths.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Stable identifier derived from the canonical path.
    pub source_id: String,
    /// Canonical absolute path.
    pub path: PathBuf,
    /// SHA-256 of the file bytes, hex encoded.
    pub fingerprint: String,
}

/// A chunk of a source's text, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source_id: String,
    pub position: usize,
    /// Character offset of the chunk within the source text.
    pub start: usize,
    pub text: String,
}

/// A chunk together with its embedding vector, as stored in the index.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub source_id: String,
    pub source_path: String,
    pub position: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(chunk: Chunk, source_path: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            source_id: chunk.source_id,
            source_path: source_path.into(),
            position: chunk.position,
            text: chunk.text,
            vector,
        }
    }
}

/// A query hit returned by the vector index.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub source_path: String,
    pub position: usize,
    pub text: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Per-source chunk count, for statistics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub source_id: String,
    pub source_path: String,
    pub chunk_count: u64,
}

/// A file the ingestion run could not use.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Summary of one reindex run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub documents_processed: usize,
    pub chunks_written: usize,
    pub skipped: Vec<SkippedFile>,
    pub elapsed_ms: u64,
}

/// A citation attached to an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub source_path: String,
    pub position: usize,
    pub score: f32,
}

/// The result of answering a question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Retrieved chunk texts, in retrieval order.
    pub relevant_chunks: Vec<String>,
    pub num_chunks: usize,
    /// `true` only if retrieved chunks were placed in the generation prompt.
    pub grounded: bool,
    pub sources: Vec<SourceRef>,
}

/// Collection statistics reported by `GET /api/stats` and `ragmind stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub total_chunks: u64,
    pub sources: Vec<SourceSummary>,
}
