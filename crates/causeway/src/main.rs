//! causeway: causality-tracked application host
//!
//! Runs an application session in which every unit of work is recorded as a
//! transaction, action and operation, with structured log entries carrying
//! that context to the console and to per-session JSONL files.

mod app;
mod config;
mod jobs;
mod resources;
mod session;
mod shutdown;

use std::path::{Path, PathBuf};

use anyhow::Result;
use causeway_logging::{ErrorCode, PlatformError};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use app::App;
use config::Config;
use shutdown::Shutdowner;

/// causeway - causality-tracked application host
#[derive(Parser)]
#[command(name = "causeway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to .causeway directory (default: search for .causeway/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the application and run until interrupted
    Run,

    /// Initialize a new .causeway directory with config file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and exit
    Check,
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize diagnostics for interactive commands. Logs to stderr.
fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(verbose))
        .init();
}

/// Initialize diagnostics for a running application.
/// Logs to rotating files in .causeway/logs/ with daily rotation, keeping
/// stdout for the console log adapter.
fn init_file_logging(causeway_dir: &Path, verbose: bool) {
    let logs_dir = causeway_dir.join("logs");

    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        init_logging(verbose);
        return;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "causeway.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // dropping the guard stops the writer thread
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(env_filter(verbose))
        .init();
}

/// Load config from file or auto-discover from `.causeway/config.toml`.
///
/// Returns the config and the `.causeway` directory, if one was found.
fn load_config(override_path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = override_path {
        // explicit path: a .causeway directory or a config file inside one
        let config_file = if path.is_dir() {
            path.join(config::CONFIG_FILE)
        } else {
            path.clone()
        };
        let causeway_dir = config_file.parent().unwrap_or(path).to_path_buf();
        let config = Config::from_file(&config_file)?;
        return Ok((config, Some(causeway_dir)));
    }

    match Config::find_and_load() {
        Ok(Some((config, causeway_dir))) => Ok((config, Some(causeway_dir))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("Warning: Error searching for config: {}, using defaults", e);
            Ok((Config::default(), None))
        }
    }
}

fn report_invalid(config: &Config) -> bool {
    let errors = config.validate();
    for error in &errors {
        eprintln!("{}", error);
    }
    !errors.is_empty()
}

async fn run(config: Config, causeway_dir: PathBuf, verbose: bool) -> Result<()> {
    init_file_logging(&causeway_dir, verbose);
    if report_invalid(&config) {
        anyhow::bail!("Invalid configuration");
    }

    let shutdowner = Shutdowner::new();
    {
        let shutdowner = shutdowner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt");
                shutdowner.request_stop();
            }
        });
    }

    let task = tokio::spawn(async move { App::run(config, &causeway_dir, shutdowner).await });
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let error = PlatformError::with_backtrace(
                ErrorCode::APPLICATION,
                format!("application task panicked: {}", e),
            );
            tracing::error!(
                code = %error.code,
                backtrace = error.backtrace.as_deref().unwrap_or_default(),
                "{}",
                error.message
            );
            eprintln!("Fatal: {}", error.message);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let (config, causeway_dir) = load_config(cli.config.as_ref())?;
            let causeway_dir = causeway_dir.unwrap_or_else(|| PathBuf::from(config::CAUSEWAY_DIR));
            run(config, causeway_dir, cli.verbose).await
        }

        Commands::Init { force } => {
            init_logging(cli.verbose);
            let causeway_dir = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(config::CAUSEWAY_DIR));
            let config_path = causeway_dir.join(config::CONFIG_FILE);

            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    config_path.display()
                );
            }

            if !causeway_dir.exists() {
                std::fs::create_dir_all(&causeway_dir)?;
                info!("Created {}/", causeway_dir.display());
            }

            std::fs::write(&config_path, config::DEFAULT_CONFIG)?;
            println!("Wrote {}", config_path.display());
            Ok(())
        }

        Commands::Check => {
            init_logging(cli.verbose);
            let (config, causeway_dir) = load_config(cli.config.as_ref())?;
            match &causeway_dir {
                Some(dir) => println!("Config: {}", dir.join(config::CONFIG_FILE).display()),
                None => println!("Config: defaults (no .causeway/config.toml found)"),
            }
            if report_invalid(&config) {
                anyhow::bail!("Invalid configuration");
            }
            println!("Configuration is valid");
            Ok(())
        }
    }
}
