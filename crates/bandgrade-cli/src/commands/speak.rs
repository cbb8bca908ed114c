//! The `bandgrade speak` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use bandgrade_core::engine::SpeakingSubmission;
use bandgrade_core::traits::AudioClip;

use super::{emit, load_engine_config, read_text, speaking_engine};

pub async fn execute(
    recording: PathBuf,
    prompt_file: PathBuf,
    json: bool,
    save: Option<PathBuf>,
    preset: Option<String>,
    config_path: Option<PathBuf>,
    mock: bool,
) -> Result<()> {
    let task_prompt = read_text(&prompt_file, "cue prompt")?;
    let bytes = std::fs::read(&recording)
        .with_context(|| format!("failed to read recording: {}", recording.display()))?;
    let file_name = recording
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording.wav".to_string());

    let (config, engine_config) = load_engine_config(
        config_path.as_deref(),
        |c| c.speaking_model.clone(),
        preset,
        mock,
    )?;
    let engine = speaking_engine(&config, engine_config, mock);

    let evaluation = engine
        .grade_speaking(&SpeakingSubmission {
            task_prompt,
            audio: AudioClip { file_name, bytes },
        })
        .await?;

    if let Some(transcript) = &evaluation.transcript {
        if !json {
            eprintln!("Transcript ({} words):", evaluation.word_count);
            eprintln!("{transcript}");
            eprintln!();
        }
    }

    emit(&evaluation, json, save)
}
