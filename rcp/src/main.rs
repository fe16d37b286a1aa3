// rcp/src/main.rs
use std::fs;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use rcp_common::cache::Cache;
use rcp_common::config::Config;
use rcp_common::error::{RcpError, Result};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::CliArgs;

fn load_config(cli_args: &CliArgs) -> Result<Config> {
    let loaded = Config::load()?;
    match &cli_args.prefix {
        Some(prefix) => {
            let mut config = Config::with_prefix(prefix)?;
            config.cache_override = loaded.cache_override;
            Ok(config)
        }
        None => Ok(loaded),
    }
}

fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("RCP_LOG")
        .from_env_lossy();

    if verbose == 0 {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    let log_dir = config.logs_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Warning:".yellow(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr.with_max_level(max_log_level))
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "rcp.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
    let stderr_writer = std::io::stderr.with_max_level(max_log_level);
    let file_writer = non_blocking_appender.with_max_level(max_log_level);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr_writer.and(file_writer))
        .with_ansi(true)
        .without_time()
        .try_init();

    // The writer flushes on drop; keep it for the life of the process.
    Box::leak(Box::new(guard));

    debug!(
        "Verbose logging enabled. Writing logs to: {}/rcp.log",
        log_dir.display()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config = load_config(&cli_args).map_err(|e| match e {
        RcpError::Config(_) => e,
        other => RcpError::Config(format!("Could not load config: {other}")),
    });
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            process::exit(1);
        }
    };

    init_logging(&config, cli_args.verbose);
    debug!("Using prefix {}", config.prefix().display());

    let cache = match Cache::new(&config) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            error!("Could not initialize cache: {:#}", e);
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = cli_args.command.run(&config, cache).await {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
