//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub features: FeaturesConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub tags: TagsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub bluesky: BlueskyConfig,

    #[serde(default)]
    pub overrides: OverridesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for run log files (default: ~/logs)
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_input")]
    pub input: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_raw_output")]
    pub raw_output: PathBuf,

    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    #[serde(default)]
    pub max_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_true")]
    pub title: bool,

    #[serde(default = "default_true")]
    pub translation: bool,

    #[serde(default = "default_true")]
    pub tagging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<String>,

    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// openai or stub
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_service_url")]
    pub service_url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default = "default_bluesky_password_env")]
    pub app_password_env: String,

    /// Feed to read; defaults to the logged-in account
    #[serde(default)]
    pub account: Option<String>,

    #[serde(default = "default_true")]
    pub include_replies: bool,

    #[serde(default)]
    pub include_reposts: bool,
}

/// Values that win over every other source when set
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OverridesConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub bluesky_username: Option<String>,

    #[serde(default)]
    pub bluesky_app_password: Option<String>,
}

impl fmt::Debug for OverridesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("OverridesConfig")
            .field("api_key", &redact(&self.api_key))
            .field("bluesky_username", &self.bluesky_username)
            .field("bluesky_app_password", &redact(&self.bluesky_app_password))
            .finish()
    }
}

/// Closed tag vocabulary used when none is configured
pub const DEFAULT_TAG_VOCABULARY: &[&str] = &[
    "vss",
    "shortform",
    "micropoem",
    "monoku",
    "haiku",
    "longform",
    "sad",
    "happy",
    "whimsical",
    "fun",
    "rhyme",
    "dark",
    "tender",
    "loving",
    "longing",
    "melancholy",
    "passionate",
];

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_input() -> PathBuf {
    PathBuf::from("poems.json")
}

fn default_output() -> PathBuf {
    PathBuf::from("processed_poems.json")
}

fn default_raw_output() -> PathBuf {
    PathBuf::from("raw_posts.json")
}

fn default_page_limit() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "Italian".to_string()
}

fn default_vocabulary() -> Vec<String> {
    DEFAULT_TAG_VOCABULARY
        .iter()
        .map(|tag| tag.to_string())
        .collect()
}

fn default_max_tags() -> usize {
    poem_enricher_domain::policy::DEFAULT_MAX_TAGS
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout() -> u64 {
    45
}

fn default_llm_retries() -> u32 {
    2
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    poem_enricher_adapters::llm::openai::DEFAULT_BASE_URL.to_string()
}

fn default_bluesky_service_url() -> String {
    poem_enricher_adapters::bluesky::DEFAULT_SERVICE_URL.to_string()
}

fn default_bluesky_password_env() -> String {
    "BLUESKY_APP_PASSWORD".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            logs_dir: None,
            log_level: default_log_level(),
            input: default_input(),
            output: default_output(),
            raw_output: default_raw_output(),
            page_limit: default_page_limit(),
            max_count: None,
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            title: true,
            translation: true,
            tagging: true,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            vocabulary: default_vocabulary(),
            max_tags: default_max_tags(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: None,
            max_output_tokens: None,
            timeout_secs: default_timeout(),
            retries: default_llm_retries(),
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service_url: default_bluesky_service_url(),
            username: None,
            app_password_env: default_bluesky_password_env(),
            account: None,
            include_replies: true,
            include_reposts: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("POEM_ENRICHER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Resolved log directory
    pub fn logs_dir(&self) -> PathBuf {
        match &self.general.logs_dir {
            Some(dir) => dir.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logs"),
        }
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# poem-enricher configuration

[general]
# logs_dir = "~/logs"
log_level = "info"
input = "poems.json"
output = "processed_poems.json"
raw_output = "raw_posts.json"
page_limit = 100
# max_count = 20

[features]
title = true
translation = true
tagging = true

[translation]
language = "Italian"

[tags]
vocabulary = [
    "vss", "shortform", "micropoem", "monoku", "haiku", "longform",
    "sad", "happy", "whimsical", "fun", "rhyme", "dark",
    "tender", "loving", "longing", "melancholy", "passionate",
]
max_tags = 5

[llm]
provider = "openai"  # openai, stub
model = "gpt-3.5-turbo"
# temperature = 0.7
# max_output_tokens = 600
timeout_secs = 45
retries = 2
api_key_env = "OPENAI_API_KEY"
base_url = "https://api.openai.com/v1"

[bluesky]
service_url = "https://bsky.social"
# username = "poet.bsky.social"
app_password_env = "BLUESKY_APP_PASSWORD"
# account = "another-poet.bsky.social"
include_replies = true
include_reposts = false

# Values set here take precedence over command-line flags
[overrides]
# api_key = "sk-..."
# bluesky_username = "poet.bsky.social"
# bluesky_app_password = "xxxx-xxxx-xxxx-xxxx"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_toml_parses_to_defaults() {
        let parsed: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(parsed.general.input, defaults.general.input);
        assert_eq!(parsed.general.page_limit, 100);
        assert_eq!(parsed.translation.language, "Italian");
        assert_eq!(parsed.tags.vocabulary, defaults.tags.vocabulary);
        assert_eq!(parsed.tags.max_tags, 5);
        assert_eq!(parsed.llm.model, "gpt-3.5-turbo");
        assert!(parsed.bluesky.include_replies);
        assert!(!parsed.bluesky.include_reposts);
        assert!(parsed.overrides.api_key.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
[translation]
language = "French"

[features]
tagging = false
"#,
        )
        .unwrap();

        assert_eq!(parsed.translation.language, "French");
        assert!(!parsed.features.tagging);
        assert!(parsed.features.title);
        assert_eq!(parsed.general.output, PathBuf::from("processed_poems.json"));
        assert_eq!(parsed.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_load_reads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[general]\npage_limit = 25\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.general.page_limit, 25);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));

        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_debug_is_redacted() {
        let overrides = OverridesConfig {
            api_key: Some("sk-secret".to_string()),
            bluesky_username: Some("poet".to_string()),
            bluesky_app_password: None,
        };
        let debug = format!("{:?}", overrides);

        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("poet"));
    }
}
