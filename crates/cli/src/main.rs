//! poem-enricher CLI entry point

use anyhow::Result;
use clap::Parser;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;
mod settings;

use args::{Cli, Commands};
use config::AppConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config(args)) => {
            let log_level = cli.log_level.as_deref().unwrap_or("info");
            init_logging(log_level, None)?;
            commands::config::execute(args).await
        }
        None => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let log_level = cli
                .log_level
                .as_deref()
                .unwrap_or(&config.general.log_level);
            let log_file = init_logging(log_level, Some(&config.logs_dir()))?;
            commands::run::execute(cli.run, config, log_file.as_deref()).await
        }
    }
}

/// Log to stderr and, when `logs_dir` is given, to a per-run file in it
///
/// Returns the path of the log file actually opened.
fn init_logging(level: &str, logs_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let (log_file, open_error) = match logs_dir.map(open_log_file).transpose() {
        Ok(opened) => (opened, None),
        Err(e) => (None, Some(e)),
    };

    let (log_path, file_layer) = match log_file {
        Some((path, file)) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    if let Some(e) = open_error {
        tracing::warn!(error = %e, "Logging to stderr only");
    }

    Ok(log_path)
}

fn open_log_file(dir: &Path) -> std::io::Result<(PathBuf, File)> {
    fs::create_dir_all(dir)?;

    let now = OffsetDateTime::now_utc();
    let stamp = time::format_description::parse("[year][month][day]_[hour][minute][second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string());

    let path = dir.join(format!("poem_enricher_{}.log", stamp));
    let file = File::create(&path)?;
    Ok((path, file))
}
