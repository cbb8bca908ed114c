//! The `bandgrade check` command.

use std::path::PathBuf;

use anyhow::Result;

use bandgrade_core::consistency::Preset;
use bandgrade_providers::config::load_config_from;

pub fn execute(config_path: Option<PathBuf>, mock: bool) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let preset: Preset = config
        .preset
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    if mock {
        println!("Mock mode: skipping credential check.");
    } else {
        config.ensure_credentials()?;
    }

    println!("Configuration OK");
    println!("  grade model:      {}", config.grade_model);
    println!("  speaking model:   {}", config.speaking_model);
    println!("  transcribe model: {}", config.transcribe_model);
    println!("  embed model:      {}", config.embed_model);
    println!("  preset:           {preset:?}");
    println!("  vector store:     {}", config.retrieval.chroma_url);
    println!("  collection:       {}", config.retrieval.collection);
    println!("  output dir:       {}", config.output_dir.display());
    Ok(())
}
