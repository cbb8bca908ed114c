pub mod check;
pub mod grade;
pub mod ingest;
pub mod init;
pub mod speak;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use bandgrade_core::engine::{EngineConfig, GradingEngine};
use bandgrade_core::model::Evaluation;
use bandgrade_core::traits::{ChatModel, Transcriber};
use bandgrade_providers::config::{load_config_from, BandgradeConfig};
use bandgrade_providers::mock::{MockModel, MockTranscriber, DEFAULT_SPEAKING_VERDICT};
use bandgrade_providers::OpenAiClient;

/// Load config, apply the preset override, and build the engine config
/// for the given model.
pub fn load_engine_config(
    config_path: Option<&Path>,
    model: impl Fn(&BandgradeConfig) -> String,
    preset: Option<String>,
    mock: bool,
) -> Result<(BandgradeConfig, EngineConfig)> {
    let mut config = load_config_from(config_path)?;
    if let Some(preset) = preset {
        config.preset = preset;
    }
    if !mock {
        config.ensure_credentials()?;
    }
    let model = model(&config);
    let engine_config = config.engine_config(&model)?;
    Ok((config, engine_config))
}

/// Build the writing-side engine: live client or the mock examiner.
pub fn writing_engine(config: &BandgradeConfig, engine_config: EngineConfig, mock: bool) -> GradingEngine {
    let chat: Arc<dyn ChatModel> = if mock {
        Arc::new(MockModel::default())
    } else {
        Arc::new(OpenAiClient::new(
            &config.openai.api_key,
            config.openai.base_url.clone(),
            Some(config.transcribe_model.clone()),
        ))
    };
    GradingEngine::new(chat, engine_config)
}

/// Build the speaking-side engine with a transcriber attached.
pub fn speaking_engine(
    config: &BandgradeConfig,
    engine_config: EngineConfig,
    mock: bool,
) -> GradingEngine {
    if mock {
        let chat: Arc<dyn ChatModel> =
            Arc::new(MockModel::with_fixed_response(DEFAULT_SPEAKING_VERDICT));
        return GradingEngine::new(chat, engine_config)
            .with_transcriber(Arc::new(MockTranscriber::default()));
    }

    let client = Arc::new(OpenAiClient::new(
        &config.openai.api_key,
        config.openai.base_url.clone(),
        Some(config.transcribe_model.clone()),
    ));
    let transcriber: Arc<dyn Transcriber> = Arc::clone(&client) as Arc<dyn Transcriber>;
    GradingEngine::new(client, engine_config).with_transcriber(transcriber)
}

/// Print the evaluation, write the optional report file.
pub fn emit(evaluation: &Evaluation, json: bool, save: Option<PathBuf>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(evaluation)?);
    } else {
        print_summary(evaluation);
    }

    if let Some(path) = save {
        evaluation.save_json(&path)?;
        eprintln!("Evaluation saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(evaluation: &Evaluation) {
    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Band", "Note"]);
    for (criterion, score) in evaluation.scores.iter() {
        table.add_row(vec![
            Cell::new(criterion.long_name()),
            Cell::new(format!("{score:.1}")),
            Cell::new(evaluation.feedback.note(criterion)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Overall"),
        Cell::new(format!("{:.1}", evaluation.overall)),
        Cell::new(&evaluation.feedback.overall_comment),
    ]);

    println!("{table}");
    println!();
    println!("Task: {} | Words: {}", evaluation.task_type, evaluation.word_count);
    if evaluation.adjusted {
        println!("Note: scores were adjusted for feedback consistency.");
    }
    if !evaluation.feedback.improvement_plan.is_empty() {
        println!("Improvement plan:");
        for item in &evaluation.feedback.improvement_plan {
            println!("  - {item}");
        }
    }
    println!(
        "Model: {} | Tokens: {} | {}ms",
        evaluation.model, evaluation.token_usage.total_tokens, evaluation.latency_ms
    );
}

/// Read a required text file with a friendly error.
pub fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what}: {}", path.display()))
}
