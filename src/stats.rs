//! Collection statistics and reindex summaries for the terminal.
//!
//! Used by `ragmind stats` and `ragmind reindex` to give a quick view of
//! what is indexed and where it came from.

use std::fmt::Write;
use std::path::Path;

use crate::models::{CollectionStats, IngestReport};

/// Render collection statistics as the `stats` command prints them.
pub fn format_stats(stats: &CollectionStats, db_path: &Path) -> String {
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "RAG Mind — Collection Stats");
    let _ = writeln!(out, "===========================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Database:    {}", db_path.display());
    let _ = writeln!(out, "  Size:        {}", format_bytes(db_size));
    let _ = writeln!(out, "  Collection:  {}", stats.collection_name);
    let _ = writeln!(out, "  Chunks:      {}", stats.total_chunks);
    let _ = writeln!(out, "  Sources:     {}", stats.sources.len());

    if !stats.sources.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {:>8}   SOURCE", "CHUNKS");
        let _ = writeln!(out, "  {}", "-".repeat(60));
        for s in &stats.sources {
            let _ = writeln!(out, "  {:>8}   {}", s.chunk_count, s.source_path);
        }
    }

    out
}

pub fn format_report(report: &IngestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reindex {} finished in {} ms", report.run_id, report.elapsed_ms);
    let _ = writeln!(out, "  documents processed: {}", report.documents_processed);
    let _ = writeln!(out, "  chunks written:      {}", report.chunks_written);
    if !report.skipped.is_empty() {
        let _ = writeln!(out, "  skipped:             {}", report.skipped.len());
        for s in &report.skipped {
            let _ = writeln!(out, "    {} ({})", s.path, s.reason);
        }
    }
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
