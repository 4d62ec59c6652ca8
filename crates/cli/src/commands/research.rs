//! `deepdive <QUESTION>`: run one research question end to end.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use deepdive_agent::{Runner, RunnerConfig, build_director};
use deepdive_config::{AppConfig, ConfigError};
use deepdive_core::event::{ProgressLog, ProgressSink};
use deepdive_core::tool::ToolRef;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Startup configuration problems.
const EXIT_CONFIG: u8 = 2;
/// The research run itself failed.
const EXIT_RUN: u8 = 1;

pub struct Options {
    pub question: String,
    pub config_path: Option<PathBuf>,
    pub max_turns: Option<u32>,
}

pub async fn run(options: Options) -> ExitCode {
    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // Credentials are resolved once, here; nothing below reads the environment.
    let credentials = match config.require_credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            report_config_error(&e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    debug!(?config, "Configuration loaded");

    let log = Arc::new(ProgressLog::default());
    let printer = spawn_progress_printer(&log);
    let progress: Arc<dyn ProgressSink> = log.clone();

    let provider = deepdive_providers::build_from_config(&config, &credentials.model_api_key);
    let search = deepdive_tools::search_tool(&config, &credentials.search_api_key, progress.clone());

    let director = match build_director(ToolRef::leaf(search), &config.agents) {
        Ok(director) => director,
        Err(e) => {
            eprintln!("  ERROR: could not assemble the research agents: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let mut runner_config =
        RunnerConfig::new(&config.model).with_max_turns(config.runner.max_turns);
    if let Some(secs) = config.runner.timeout_secs {
        runner_config = runner_config.with_timeout(Duration::from_secs(secs));
    }
    let runner = Runner::new(provider, runner_config).with_progress(progress);

    info!(provider = %config.provider, model = %config.model, "Starting research");
    let outcome = runner.run(&director, &options.question).await;

    // The printer stops once every holder of the log is gone.
    drop(runner);
    drop(director);
    drop(log);
    let _ = printer.await;

    match outcome {
        Ok(result) => {
            info!(
                turns = result.turns_taken,
                total_tokens = result.usage.total_tokens,
                "Research finished"
            );
            println!("=== Final Answer ===");
            println!("{}", result.final_output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: research failed: {e}");
            if let Some(transcript) = e.transcript() {
                eprintln!("  ({} messages recorded before the run stopped)", transcript.len());
            }
            ExitCode::from(EXIT_RUN)
        }
    }
}

fn load_config(options: &Options) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load_with(options.config_path.as_deref())?;
    if let Some(max_turns) = options.max_turns {
        if max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "--max-turns must be at least 1".into(),
            ));
        }
        config.runner.max_turns = max_turns;
    }
    Ok(config)
}

fn report_config_error(error: &ConfigError) {
    eprintln!();
    eprintln!("  ERROR: {error}");
    if let ConfigError::MissingCredential { .. } = error {
        eprintln!();
        eprintln!("  Set the keys in your environment or in a .env file:");
        eprintln!("    GEMINI_API_KEY=...   (model, https://aistudio.google.com/apikey)");
        eprintln!("    TAVILY_API_KEY=...   (search, https://app.tavily.com)");
        eprintln!();
        eprintln!("  Or add them to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    }
    eprintln!();
}

/// Print progress lines to stderr as they are recorded.
///
/// The task ends once the log and every sink holding it are dropped.
fn spawn_progress_printer(log: &ProgressLog) -> tokio::task::JoinHandle<()> {
    let mut rx = log.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => eprintln!("{}", event.render()),
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("  ({skipped} progress lines skipped)");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
