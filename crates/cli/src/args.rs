//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use time::Date;

/// poem-enricher: fetch poems from Bluesky and enrich them with titles, translations and tags
#[derive(Parser, Debug)]
#[command(name = "poem-enricher")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Input JSON file; fetched posts are cached here (default: poems.json)
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output JSON file for enriched posts (default: processed_poems.json)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output JSON file for raw posts with --no-openai (default: raw_posts.json)
    #[arg(long, value_name = "FILE")]
    pub raw_output: Option<PathBuf>,

    /// OpenAI API key (falls back to the OPENAI_API_KEY environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Process posts from the last N days, today included
    #[arg(long, value_name = "N")]
    pub days: Option<u32>,

    /// Process all posts regardless of date
    #[arg(long)]
    pub all: bool,

    /// Skip the language model and write raw posts
    #[arg(long)]
    pub no_openai: bool,

    /// Bluesky handle or email
    #[arg(long, value_name = "USER")]
    pub bluesky_user: Option<String>,

    /// Bluesky app password
    #[arg(long, value_name = "PASS")]
    pub bluesky_password: Option<String>,

    /// Read posts from the input file instead of Bluesky
    #[arg(long)]
    pub no_fetch: bool,

    /// Maximum number of posts to process
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,

    /// Posts per page when fetching from Bluesky (default: 100)
    #[arg(long, value_name = "N")]
    pub limit: Option<u32>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub start_date: Option<Date>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    pub end_date: Option<Date>,

    /// Do not generate titles
    #[arg(long)]
    pub disable_title: bool,

    /// Do not translate
    #[arg(long)]
    pub disable_translation: bool,

    /// Do not tag
    #[arg(long)]
    pub disable_tagging: bool,

    /// Target language for translations
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(value: &str) -> Result<Date, String> {
    let format =
        time::format_description::parse("[year]-[month]-[day]").map_err(|e| e.to_string())?;
    Date::parse(value.trim(), &format)
        .map_err(|e| format!("invalid date '{}' (expected YYYY-MM-DD): {}", value, e))
}
