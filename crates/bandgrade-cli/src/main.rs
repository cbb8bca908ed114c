//! bandgrade CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bandgrade", version, about = "LLM-delegated IELTS band scoring")]
struct Cli {
    /// Use the built-in mock examiner instead of a live API.
    #[arg(long, global = true, hide = true)]
    mock: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a writing submission
    Grade {
        /// Essay text file
        essay: PathBuf,

        /// Task type: academic_task_1, general_task_1, task_2
        #[arg(long, default_value = "task_2")]
        task_type: String,

        /// File containing the task prompt
        #[arg(long)]
        prompt_file: PathBuf,

        /// Chart/diagram image (academic_task_1 only)
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Print the evaluation as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Write the evaluation JSON to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Consistency preset: lenient, strict
        #[arg(long)]
        preset: Option<String>,
    },

    /// Grade a speaking recording
    Speak {
        /// Audio recording (wav, mp3, m4a)
        recording: PathBuf,

        /// File containing the cue card / question prompt
        #[arg(long)]
        prompt_file: PathBuf,

        /// Print the evaluation as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Write the evaluation JSON to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Consistency preset: lenient, strict
        #[arg(long)]
        preset: Option<String>,
    },

    /// Ingest a rubric file into the vector store
    Ingest {
        /// Rubric markdown/text file
        #[arg(long)]
        rubric: PathBuf,

        /// Task type the rubric applies to
        #[arg(long)]
        task_type: String,
    },

    /// Validate configuration and credentials
    Check,

    /// Create a starter bandgrade.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bandgrade_core=info".parse().unwrap())
                .add_directive("bandgrade_providers=info".parse().unwrap())
                .add_directive("bandgrade_retrieval=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            essay,
            task_type,
            prompt_file,
            chart,
            json,
            save,
            preset,
        } => {
            commands::grade::execute(
                essay,
                task_type,
                prompt_file,
                chart,
                json,
                save,
                preset,
                cli.config,
                cli.mock,
            )
            .await
        }
        Commands::Speak {
            recording,
            prompt_file,
            json,
            save,
            preset,
        } => {
            commands::speak::execute(
                recording,
                prompt_file,
                json,
                save,
                preset,
                cli.config,
                cli.mock,
            )
            .await
        }
        Commands::Ingest { rubric, task_type } => {
            commands::ingest::execute(rubric, task_type, cli.config).await
        }
        Commands::Check => commands::check::execute(cli.config, cli.mock),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
