//! The `bandgrade ingest` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use bandgrade_core::model::TaskType;
use bandgrade_providers::config::load_config_from;
use bandgrade_retrieval::{ingest_file, ChromaStore, EmbeddingClient};

pub async fn execute(
    rubric: PathBuf,
    task_type: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let task_type: TaskType = task_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let config = load_config_from(config_path.as_deref())?;
    config.ensure_credentials()?;

    let embedder = EmbeddingClient::new(
        &config.openai.api_key,
        config.openai.base_url.clone(),
        &config.embed_model,
    );
    let store = ChromaStore::new(
        &config.retrieval.chroma_url,
        &config.retrieval.collection,
        Arc::new(EmbeddingClient::new(
            &config.openai.api_key,
            config.openai.base_url.clone(),
            &config.embed_model,
        )),
    );

    let report = ingest_file(&rubric, task_type, &embedder, &store).await?;
    println!(
        "Ingested {}: {} chunks stored in collection '{}'",
        report.source_file, report.chunks_stored, config.retrieval.collection
    );
    Ok(())
}
