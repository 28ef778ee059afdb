//! Seedline - configuration-driven ETL pipeline

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use seedline_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use seedline_ingest::{PipelineConfig, PipelineOrchestrator, RunSummary};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "seedline")]
#[command(author, version, about = "Fetch, validate and seed data from configured sources")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the data tree (config/, raw/, processed/, seeds/, schema/, metadata/)
    #[arg(long, global = true, env = "SEEDLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Source configuration file (default: <data-dir>/config/source.config.json)
    #[arg(long, global = true, env = "SEEDLINE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Fetch, process and seed in one run
    Run,

    /// Fetch raw data from every enabled source
    Fetch,

    /// Validate and anonymize raw data already on disk
    Process,

    /// Generate seed files from processed data on disk
    Seed,

    /// Validate the configuration and schemas without fetching
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = build_log_config(cli.verbose);
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        },
    };

    if let Err(e) = execute(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Builder defaults, then environment overrides; `--verbose` wins over `LOG_LEVEL`
fn build_log_config(verbose: bool) -> LogConfig {
    let defaults = LogConfig::builder()
        .level(LogLevel::Info)
        .output(LogOutput::Console)
        .log_file_prefix("seedline")
        .build();

    let mut config = defaults.clone().merge_env().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring invalid logging environment: {}", e);
        defaults
    });

    if verbose {
        config.level = LogLevel::Debug;
    }
    config
}

fn pipeline_config(cli: &Cli) -> PipelineConfig {
    let config = match &cli.data_dir {
        Some(dir) => PipelineConfig::from_data_dir(dir),
        None => PipelineConfig::from_env(),
    };

    match &cli.config {
        Some(path) => config.with_config_path(path),
        None => config,
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = pipeline_config(cli);
    let orchestrator = PipelineOrchestrator::load(config).await?;
    info!("Run id: {}", orchestrator.run_id());

    let summary = match cli.command {
        Command::Check => {
            let report = orchestrator.check();
            println!("{} {}", "Configuration OK:".green().bold(), report);
            return Ok(());
        },
        Command::Run => orchestrator.run().await?,
        Command::Fetch => orchestrator.fetch().await?,
        Command::Process => orchestrator.process().await?,
        Command::Seed => orchestrator.seed().await?,
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "Summary".cyan().bold());
    print!("{}", summary);

    let errors = summary.total_errors();
    if errors > 0 {
        println!("{}", format!("{} record(s) failed validation", errors).yellow());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_level() {
        let config = build_log_config(true);
        assert_eq!(config.level, LogLevel::Debug);
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["seedline", "check", "--verbose", "--data-dir", "/tmp/data"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/data")));
        assert!(matches!(cli.command, Command::Check));
    }
}
