//! scanx CLI - exercise the index scan entry exchange.

use anyhow::Result;
use clap::{Parser, Subcommand};
use scanx_core::config::LogFormat;
use scanx_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
/// - 128+N: Signal N received (e.g., 130 = SIGINT)
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, bad value)
    ConfigError = 1,
    /// Scan error (invalid scan size, scan reported errors)
    ScanError = 2,
    /// General runtime error
    RuntimeError = 10,
    /// Signal interrupt (SIGINT = 2, so 128 + 2 = 130)
    SignalInterrupt = 130,
}

impl ExitCode {
    /// Convert an error to an exit code by inspecting the error message.
    fn from_error(error: &anyhow::Error) -> Self {
        let error_str = error.to_string().to_lowercase();

        if error_str.contains("interrupted") {
            ExitCode::SignalInterrupt
        } else if error_str.contains("config") || error_str.contains("toml") || error_str.contains("parse")
        {
            ExitCode::ConfigError
        } else if error_str.contains("scan") {
            ExitCode::ScanError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "scanx")]
#[command(about = "Index scan entry exchange harness", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream entries from producers to a consumer and report throughput
    Bench {
        /// Exchange capacity (defaults to the configured scan cap)
        #[arg(long)]
        capacity: Option<i64>,

        /// Entries per scan
        #[arg(long, default_value_t = 100_000)]
        entries: u64,

        /// Producer threads per scan
        #[arg(long, default_value_t = 1)]
        producers: usize,

        /// Sequential scans to run
        #[arg(long, default_value_t = 1)]
        scans: u32,

        /// Consumer delay per entry, in microseconds
        #[arg(long, default_value_t = 0)]
        consumer_delay_us: u64,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Try to load config for log settings (optional - falls back to defaults)
    let monitoring = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_directive()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .init();
        }
    }

    let result = execute_command(cli).await;

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Bench {
            capacity,
            entries,
            producers,
            scans,
            consumer_delay_us,
        } => {
            let config = load_config(&cli.config)?;
            let options = commands::bench::BenchOptions {
                capacity,
                entries,
                producers,
                scans,
                consumer_delay_us,
            };
            commands::bench::run(config, options).await?;
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            commands::validate::run(&config)?;
        }
    }

    Ok(())
}

/// Load the configuration file, or defaults when no path was given.
fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}
