//! Full reindex of the configured document paths.
//!
//! One run: take the rebuild guard, clear the collection, discover files,
//! then for each file extract → chunk → embed → replace its records.
//!
//! Per-file problems (unreadable file, bad UTF-8, broken PDF) are logged,
//! recorded in the report, and skipped. An embedding failure aborts the run
//! with [`RagError::IngestionFailed`]; the collection then holds whatever
//! was written before the failure and the caller is expected to rerun.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::chunk::chunk_document;
use crate::config::{FilesConfig, Settings};
use crate::embedding::EmbeddingGateway;
use crate::error::{RagError, Result};
use crate::extract;
use crate::models::{DocumentSource, EmbeddingRecord, IngestReport, SkippedFile};
use crate::sources::{self, FileFilter};
use crate::store::IndexHandle;

/// Rebuild the collection behind `index` from `settings.document_paths`.
///
/// Fails with [`RagError::IngestionInProgress`] without touching the index
/// if another rebuild holds the guard.
pub async fn reindex(
    index: &IndexHandle,
    embeddings: &EmbeddingGateway,
    settings: &Settings,
    files: &FilesConfig,
) -> Result<IngestReport> {
    let params = settings.chunk_params()?;
    let filter = FileFilter::from_config(files)?;
    let rebuild = index.begin_rebuild().await?;

    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("reindex", run_id = %run_id, collection = index.collection());

    async move {
        let started = Instant::now();
        let store = rebuild.index();
        store.clear().await?;

        let discovery = sources::discover(&settings.document_paths, &filter);
        tracing::info!(
            paths = settings.document_paths.len(),
            files = discovery.files.len(),
            "starting reindex"
        );

        let mut skipped = discovery.skipped;
        let mut documents_processed = 0usize;
        let mut chunks_written = 0usize;

        for path in discovery.files {
            let (source, text) = match load_source(&path).await {
                Ok(loaded) => loaded,
                Err(reason) => {
                    tracing::warn!(path = %path.display(), reason = %reason, "skipping file");
                    skipped.push(SkippedFile {
                        path: path.display().to_string(),
                        reason,
                    });
                    continue;
                }
            };

            let chunks = chunk_document(&source.source_id, &text, &params);
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embeddings
                .embed(&texts)
                .await
                .map_err(|e| RagError::IngestionFailed {
                    documents_processed,
                    source: Box::new(e),
                })?;

            let source_path = source.path.display().to_string();
            let records: Vec<EmbeddingRecord> = chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord::new(chunk, source_path.clone(), vector))
                .collect();

            store.delete_by_source(&source.source_id).await?;
            store.upsert(&records).await?;

            tracing::debug!(
                path = %source_path,
                fingerprint = %source.fingerprint,
                chunks = records.len(),
                "indexed document"
            );
            documents_processed += 1;
            chunks_written += records.len();
        }

        let report = IngestReport {
            run_id,
            documents_processed,
            chunks_written,
            skipped,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            documents = report.documents_processed,
            chunks = report.chunks_written,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed_ms,
            "reindex complete"
        );
        Ok::<_, RagError>(report)
    }
    .instrument(span)
    .await
}

/// Read and extract one file. Errors are returned as a skip reason.
async fn load_source(path: &Path) -> std::result::Result<(DocumentSource, String), String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    let source = DocumentSource {
        source_id: sources::source_id_for(path),
        path: path.to_path_buf(),
        fingerprint: sources::fingerprint(&bytes),
    };

    let owned: PathBuf = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || extract::extract_text(&owned, bytes))
        .await
        .map_err(|e| format!("extraction aborted: {}", e))?
        .map_err(|e| e.to_string())?;

    Ok((source, text))
}
