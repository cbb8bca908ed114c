//! The `bandgrade grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use bandgrade_core::engine::WritingSubmission;
use bandgrade_core::model::TaskType;
use bandgrade_providers::image::attachment_from_bytes;

use super::{emit, load_engine_config, read_text, writing_engine};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    essay_path: PathBuf,
    task_type: String,
    prompt_file: PathBuf,
    chart_path: Option<PathBuf>,
    json: bool,
    save: Option<PathBuf>,
    preset: Option<String>,
    config_path: Option<PathBuf>,
    mock: bool,
) -> Result<()> {
    let task_type: TaskType = task_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    anyhow::ensure!(
        task_type != TaskType::Speaking,
        "use `bandgrade speak` for speaking submissions"
    );

    let essay = read_text(&essay_path, "essay")?;
    let task_prompt = read_text(&prompt_file, "task prompt")?;

    let chart = match &chart_path {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read chart image: {}", path.display()))?;
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            Some(attachment_from_bytes(&bytes, file_name.as_deref())?)
        }
        None => None,
    };

    let (config, engine_config) = load_engine_config(
        config_path.as_deref(),
        |c| c.grade_model.clone(),
        preset,
        mock,
    )?;
    let engine = writing_engine(&config, engine_config, mock);

    let evaluation = engine
        .grade_writing(&WritingSubmission {
            task_type,
            task_prompt,
            essay,
            chart,
        })
        .await?;

    emit(&evaluation, json, save)
}
