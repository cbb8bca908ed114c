//! Process configuration: TOML files, env resolution, and engine wiring.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use bandgrade_core::consistency::{ConsistencyConfig, Preset};
use bandgrade_core::engine::EngineConfig;

/// OpenAI API settings.
///
/// Note: Custom Debug impl masks the API key to prevent accidental exposure
/// in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
        }
    }
}

/// Rubric retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Base URL of the vector store HTTP API.
    #[serde(default = "default_chroma_url")]
    pub chroma_url: String,
    /// Collection holding rubric chunks.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// How many rubric chunks to retrieve per grading call.
    #[serde(default = "default_rubric_k")]
    pub rubric_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chroma_url: default_chroma_url(),
            collection: default_collection(),
            rubric_k: default_rubric_k(),
        }
    }
}

/// Top-level bandgrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandgradeConfig {
    #[serde(default)]
    pub openai: OpenAiSettings,
    /// Model used for writing evaluation.
    #[serde(default = "default_grade_model")]
    pub grade_model: String,
    /// Model used for speaking evaluation.
    #[serde(default = "default_speaking_model")]
    pub speaking_model: String,
    /// Model used for audio transcription.
    #[serde(default = "default_transcribe_model")]
    pub transcribe_model: String,
    /// Model used for rubric embeddings.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Sampling temperature for grading calls.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Max completion tokens per grading call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Max retries on transient provider errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay between retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Consistency adjustment preset ("lenient" or "strict").
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    /// Output directory for saved evaluations.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_grade_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_speaking_model() -> String {
    "gpt-4o".to_string()
}
fn default_transcribe_model() -> String {
    "whisper-1".to_string()
}
fn default_embed_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_preset() -> String {
    "lenient".to_string()
}
fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_collection() -> String {
    "ielts_rubrics".to_string()
}
fn default_rubric_k() -> usize {
    8
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./bandgrade-results")
}

impl Default for BandgradeConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            grade_model: default_grade_model(),
            speaking_model: default_speaking_model(),
            transcribe_model: default_transcribe_model(),
            embed_model: default_embed_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            preset: default_preset(),
            retrieval: RetrievalSettings::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl BandgradeConfig {
    /// Fail fast if no API credentials are available.
    pub fn ensure_credentials(&self) -> Result<()> {
        if self.openai.api_key.is_empty() {
            anyhow::bail!(
                "no OpenAI API key configured; set BANDGRADE_OPENAI_KEY or add \
                 [openai] api_key to bandgrade.toml"
            );
        }
        Ok(())
    }

    /// Build an engine config for the given modality's model.
    pub fn engine_config(&self, model: &str) -> Result<EngineConfig> {
        let preset: Preset = self
            .preset
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        Ok(EngineConfig {
            model: model.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            consistency: ConsistencyConfig::preset(preset),
            rubric_k: self.retrieval.rubric_k,
        })
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `bandgrade.toml` in the current directory
/// 2. `~/.config/bandgrade/config.toml`
///
/// Environment variable override: `BANDGRADE_OPENAI_KEY`.
pub fn load_config() -> Result<BandgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BandgradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("bandgrade.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<BandgradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BandgradeConfig::default(),
    };

    if let Ok(key) = std::env::var("BANDGRADE_OPENAI_KEY") {
        config.openai.api_key = key;
    }

    config.openai.api_key = resolve_env_vars(&config.openai.api_key);
    if let Some(url) = &config.openai.base_url {
        config.openai.base_url = Some(resolve_env_vars(url));
    }
    config.retrieval.chroma_url = resolve_env_vars(&config.retrieval.chroma_url);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("bandgrade"))
}
