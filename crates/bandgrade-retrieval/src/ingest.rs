//! Rubric ingestion: chunk, embed in batches, upsert.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use bandgrade_core::model::TaskType;

use crate::embed::Embedder;
use crate::store::{ChromaStore, StoredChunk};

const MAX_CHUNK_CHARS: usize = 1400;
const CHUNK_OVERLAP: usize = 200;
const EMBED_BATCH_SIZE: usize = 64;

/// Summary of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source_file: String,
    pub chunks_stored: usize,
}

/// Split rubric text into overlapping windows.
///
/// Normalizes line endings and collapses runs of blank lines first, so
/// chunk boundaries are stable across checkouts.
pub fn chunk_text(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut collapsed = String::with_capacity(normalized.len());
    let mut newlines = 0;
    for ch in normalized.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        collapsed.push(ch);
    }
    let text = collapsed.trim();

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = MAX_CHUNK_CHARS - CHUNK_OVERLAP;
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let end = (i + MAX_CHUNK_CHARS).min(chars.len());
        let chunk: String = chars[i..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        i += step;
    }
    chunks
}

/// Ingest one rubric file: chunk it, embed each batch, and upsert the
/// chunks with task-type metadata.
pub async fn ingest_file(
    path: &Path,
    task_type: TaskType,
    embedder: &dyn Embedder,
    store: &ChromaStore,
) -> Result<IngestReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rubric file: {}", path.display()))?;
    let source_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let texts = chunk_text(&raw);
    if texts.is_empty() {
        anyhow::bail!("rubric file is empty: {}", path.display());
    }

    let chunks: Vec<StoredChunk> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| StoredChunk {
            id: format!("{source_file}-{index}"),
            text: text.clone(),
            task_type: task_type.to_string(),
            source_file: source_file.clone(),
            chunk_index: index,
        })
        .collect();

    let mut stored = 0;
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        store.upsert(batch, &embeddings).await?;
        stored += batch.len();
    }

    info!(file = %source_file, chunks = stored, "rubric ingested");
    Ok(IngestReport {
        source_file,
        chunks_stored: stored,
    })
}
