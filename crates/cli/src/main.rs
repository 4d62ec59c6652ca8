//! DeepDive CLI: the main entry point.
//!
//! Takes one research question, runs the research director over it and
//! prints the final report. Progress lines stream to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(
    name = "deepdive",
    about = "DeepDive: hierarchical multi-agent research assistant",
    version,
    author
)]
struct Cli {
    /// The research question
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,

    /// Path to a config file (defaults to ~/.deepdive/config.toml)
    #[arg(short, long, env = "DEEPDIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the per-agent model turn budget
    #[arg(long)]
    max_turns: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = commands::research::Options {
        question: cli.question.join(" "),
        config_path: cli.config,
        max_turns: cli.max_turns,
    };

    commands::research::run(options).await
}
