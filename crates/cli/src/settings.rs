//! Resolution of flags, configuration and environment into run settings
//!
//! Precedence, highest first: `[overrides]` in the config file, command-line
//! flags, config/environment values, built-in defaults.

use poem_enricher_domain::policy::TagPolicy;
use poem_enricher_domain::usecases::{DateWindow, EnrichConfig, EnrichConfigError, FeatureFlags};
use secrecy::SecretString;
use std::path::PathBuf;
use thiserror::Error;
use time::Date;

use crate::args::RunArgs;
use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("--days must be at least 1")]
    ZeroDays,
    #[error("--count must be at least 1")]
    ZeroCount,
    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: Date, end: Date },
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),
    #[error(
        "Bluesky credentials are required to fetch posts (use --bluesky-user and \
         --bluesky-password, or --no-fetch with an existing input file)"
    )]
    MissingCredentials,
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
    #[error(transparent)]
    Enrich(#[from] EnrichConfigError),
}

/// Bluesky login and the feed to read
#[derive(Debug, Clone)]
pub struct BlueskyCredentials {
    pub username: String,
    pub app_password: SecretString,
    pub account: String,
}

/// Where posts come from
#[derive(Debug, Clone)]
pub enum PostInput {
    Fetch(BlueskyCredentials),
    File(PathBuf),
}

/// Language model backing an enrich run
#[derive(Debug, Clone)]
pub enum ModelChoice {
    OpenAi { api_key: SecretString },
    Stub,
}

/// What the run produces
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Enriched records written to the output file
    Enrich {
        model: ModelChoice,
        config: EnrichConfig,
    },
    /// Selected raw posts written to the raw output file
    Raw,
}

/// Resolved, read-only settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub window: DateWindow,
    pub today: Date,
    pub max_count: Option<usize>,
    pub page_limit: u32,
    pub input: PostInput,
    pub mode: RunMode,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub raw_output_path: PathBuf,
}

impl Settings {
    /// Build settings from parsed flags and loaded configuration
    ///
    /// `env` looks up environment variables so tests can supply their own.
    pub fn resolve<F>(
        cli: &RunArgs,
        config: &AppConfig,
        env: F,
        today: Date,
    ) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = &config.overrides;

        let window = resolve_window(cli)?;

        let max_count = match cli.count.or(config.general.max_count) {
            Some(0) => return Err(SettingsError::ZeroCount),
            other => other,
        };

        let input_path = cli
            .input
            .clone()
            .unwrap_or_else(|| config.general.input.clone());
        let output_path = cli
            .output
            .clone()
            .unwrap_or_else(|| config.general.output.clone());
        let raw_output_path = cli
            .raw_output
            .clone()
            .unwrap_or_else(|| config.general.raw_output.clone());

        let input = if cli.no_fetch {
            if !input_path.exists() {
                return Err(SettingsError::InputNotFound(input_path));
            }
            PostInput::File(input_path.clone())
        } else {
            let username = first_non_blank([
                overrides.bluesky_username.clone(),
                cli.bluesky_user.clone(),
                config.bluesky.username.clone(),
            ]);
            let password = first_non_blank([
                overrides.bluesky_app_password.clone(),
                cli.bluesky_password.clone(),
                env(&config.bluesky.app_password_env),
            ]);

            match (username, password) {
                (Some(username), Some(password)) => {
                    let account = first_non_blank([config.bluesky.account.clone()])
                        .unwrap_or_else(|| username.clone());
                    PostInput::Fetch(BlueskyCredentials {
                        username,
                        app_password: SecretString::new(password.into()),
                        account,
                    })
                }
                _ if input_path.exists() => {
                    tracing::warn!(
                        input = %input_path.display(),
                        "No Bluesky credentials, reading posts from the input file"
                    );
                    PostInput::File(input_path.clone())
                }
                _ => return Err(SettingsError::MissingCredentials),
            }
        };

        let mode = if cli.no_openai {
            RunMode::Raw
        } else {
            let model = match config.llm.provider.trim() {
                "openai" => {
                    let api_key = first_non_blank([
                        overrides.api_key.clone(),
                        cli.api_key.clone(),
                        env(&config.llm.api_key_env),
                    ]);
                    api_key.map(|key| ModelChoice::OpenAi {
                        api_key: SecretString::new(key.into()),
                    })
                }
                "stub" => Some(ModelChoice::Stub),
                other => return Err(SettingsError::UnknownProvider(other.to_string())),
            };

            match model {
                Some(model) => {
                    let features = FeatureFlags {
                        title: config.features.title && !cli.disable_title,
                        translation: config.features.translation && !cli.disable_translation,
                        tagging: config.features.tagging && !cli.disable_tagging,
                    };
                    let language = first_non_blank([cli.language.clone()])
                        .unwrap_or_else(|| config.translation.language.clone());
                    let tags = TagPolicy::new(&config.tags.vocabulary, config.tags.max_tags);

                    RunMode::Enrich {
                        model,
                        config: EnrichConfig::new(features, language, tags)?,
                    }
                }
                None => {
                    tracing::warn!(
                        env = %config.llm.api_key_env,
                        "No OpenAI API key, writing raw posts instead"
                    );
                    RunMode::Raw
                }
            }
        };

        Ok(Self {
            window,
            today,
            max_count,
            page_limit: cli.limit.unwrap_or(config.general.page_limit),
            input,
            mode,
            input_path,
            output_path,
            raw_output_path,
        })
    }

    /// File the run writes its results to
    pub fn destination(&self) -> &PathBuf {
        match self.mode {
            RunMode::Enrich { .. } => &self.output_path,
            RunMode::Raw => &self.raw_output_path,
        }
    }
}

/// Explicit range, else `--all`, else `--days`, else today
fn resolve_window(cli: &RunArgs) -> Result<DateWindow, SettingsError> {
    if cli.start_date.is_some() || cli.end_date.is_some() {
        if let (Some(start), Some(end)) = (cli.start_date, cli.end_date) {
            if start > end {
                return Err(SettingsError::InvalidDateRange { start, end });
            }
        }
        return Ok(DateWindow::Between {
            start: cli.start_date,
            end: cli.end_date,
        });
    }

    if cli.all {
        return Ok(DateWindow::Unbounded);
    }

    match cli.days {
        Some(0) => Err(SettingsError::ZeroDays),
        Some(days) => Ok(DateWindow::LastDays(days)),
        None => Ok(DateWindow::Today),
    }
}

fn first_non_blank<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use time::Month;

    fn today() -> Date {
        Date::from_calendar_date(2024, Month::March, 10).unwrap()
    }

    fn date(day: u8) -> Date {
        Date::from_calendar_date(2024, Month::March, day).unwrap()
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        env_from(&[])
    }

    /// Flags for a fetch run with credentials on the command line
    fn fetch_args() -> RunArgs {
        RunArgs {
            bluesky_user: Some("poet.bsky.social".to_string()),
            bluesky_password: Some("app-pass".to_string()),
            ..Default::default()
        }
    }

    fn api_key(settings: &Settings) -> Option<String> {
        match &settings.mode {
            RunMode::Enrich {
                model: ModelChoice::OpenAi { api_key },
                ..
            } => Some(api_key.expose_secret().to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_hardcoded_api_key_beats_cli() {
        let mut config = AppConfig::default();
        config.overrides.api_key = Some("X".to_string());
        let args = RunArgs {
            api_key: Some("Y".to_string()),
            ..fetch_args()
        };

        let settings = Settings::resolve(&args, &config, no_env(), today()).unwrap();

        assert_eq!(api_key(&settings).as_deref(), Some("X"));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = AppConfig::default();
        config.overrides.api_key = Some("   ".to_string());
        let args = RunArgs {
            api_key: Some("Y".to_string()),
            ..fetch_args()
        };

        let settings = Settings::resolve(&args, &config, no_env(), today()).unwrap();

        assert_eq!(api_key(&settings).as_deref(), Some("Y"));
    }

    #[test]
    fn test_api_key_falls_back_to_env() {
        let settings = Settings::resolve(
            &fetch_args(),
            &AppConfig::default(),
            env_from(&[("OPENAI_API_KEY", "from-env")]),
            today(),
        )
        .unwrap();

        assert_eq!(api_key(&settings).as_deref(), Some("from-env"));
    }

    #[test]
    fn test_missing_api_key_switches_to_raw() {
        let settings =
            Settings::resolve(&fetch_args(), &AppConfig::default(), no_env(), today()).unwrap();

        assert!(matches!(settings.mode, RunMode::Raw));
        assert_eq!(settings.destination(), &PathBuf::from("raw_posts.json"));
    }

    #[test]
    fn test_hardcoded_credentials_beat_cli() {
        let mut config = AppConfig::default();
        config.overrides.bluesky_username = Some("override.bsky.social".to_string());
        config.overrides.bluesky_app_password = Some("override-pass".to_string());

        let settings = Settings::resolve(&fetch_args(), &config, no_env(), today()).unwrap();

        match settings.input {
            PostInput::Fetch(creds) => {
                assert_eq!(creds.username, "override.bsky.social");
                assert_eq!(creds.app_password.expose_secret(), "override-pass");
                assert_eq!(creds.account, "override.bsky.social");
            }
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_window_precedence() {
        let range = RunArgs {
            start_date: Some(date(1)),
            end_date: Some(date(5)),
            all: true,
            days: Some(3),
            ..fetch_args()
        };
        let all = RunArgs {
            all: true,
            days: Some(3),
            ..fetch_args()
        };
        let days = RunArgs {
            days: Some(3),
            ..fetch_args()
        };
        let config = AppConfig::default();

        let window = |args: &RunArgs| {
            Settings::resolve(args, &config, no_env(), today())
                .unwrap()
                .window
        };

        assert_eq!(
            window(&range),
            DateWindow::Between {
                start: Some(date(1)),
                end: Some(date(5))
            }
        );
        assert_eq!(window(&all), DateWindow::Unbounded);
        assert_eq!(window(&days), DateWindow::LastDays(3));
        assert_eq!(window(&fetch_args()), DateWindow::Today);
    }

    #[test]
    fn test_open_ended_range() {
        let args = RunArgs {
            start_date: Some(date(8)),
            ..fetch_args()
        };

        let settings = Settings::resolve(&args, &AppConfig::default(), no_env(), today()).unwrap();

        assert_eq!(
            settings.window,
            DateWindow::Between {
                start: Some(date(8)),
                end: None
            }
        );
    }

    #[test]
    fn test_invalid_windows_are_rejected() {
        let reversed = RunArgs {
            start_date: Some(date(5)),
            end_date: Some(date(1)),
            ..fetch_args()
        };
        let zero_days = RunArgs {
            days: Some(0),
            ..fetch_args()
        };
        let config = AppConfig::default();

        assert!(matches!(
            Settings::resolve(&reversed, &config, no_env(), today()),
            Err(SettingsError::InvalidDateRange { .. })
        ));
        assert!(matches!(
            Settings::resolve(&zero_days, &config, no_env(), today()),
            Err(SettingsError::ZeroDays)
        ));
    }

    #[test]
    fn test_no_fetch_requires_existing_input() {
        let dir = TempDir::new().unwrap();
        let args = RunArgs {
            no_fetch: true,
            input: Some(dir.path().join("absent.json")),
            ..Default::default()
        };

        let result = Settings::resolve(&args, &AppConfig::default(), no_env(), today());

        assert!(matches!(result, Err(SettingsError::InputNotFound(_))));
    }

    #[test]
    fn test_missing_credentials_without_input_fails() {
        let dir = TempDir::new().unwrap();
        let args = RunArgs {
            input: Some(dir.path().join("absent.json")),
            ..Default::default()
        };

        let result = Settings::resolve(&args, &AppConfig::default(), no_env(), today());

        assert!(matches!(result, Err(SettingsError::MissingCredentials)));
    }

    #[test]
    fn test_missing_credentials_falls_back_to_input_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("poems.json");
        std::fs::write(&input, "[]").unwrap();
        let args = RunArgs {
            input: Some(input.clone()),
            ..Default::default()
        };

        let settings = Settings::resolve(&args, &AppConfig::default(), no_env(), today()).unwrap();

        assert!(matches!(settings.input, PostInput::File(ref path) if *path == input));
    }

    #[test]
    fn test_feature_flags_and_language() {
        let mut config = AppConfig::default();
        config.llm.provider = "stub".to_string();
        config.features.title = false;
        let args = RunArgs {
            disable_tagging: true,
            language: Some("French".to_string()),
            ..fetch_args()
        };

        let settings = Settings::resolve(&args, &config, no_env(), today()).unwrap();

        match settings.mode {
            RunMode::Enrich { model, config } => {
                assert!(matches!(model, ModelChoice::Stub));
                assert_eq!(
                    config.features(),
                    FeatureFlags {
                        title: false,
                        translation: true,
                        tagging: false
                    }
                );
                assert_eq!(config.language(), "French");
            }
            RunMode::Raw => panic!("expected enrich mode"),
        }
    }

    #[test]
    fn test_translation_without_language_is_rejected() {
        let mut config = AppConfig::default();
        config.llm.provider = "stub".to_string();
        config.translation.language = String::new();

        let result = Settings::resolve(&fetch_args(), &config, no_env(), today());

        assert!(matches!(
            result,
            Err(SettingsError::Enrich(EnrichConfigError::MissingLanguage))
        ));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.llm.provider = "carrier-pigeon".to_string();

        let result = Settings::resolve(&fetch_args(), &config, no_env(), today());

        assert!(matches!(result, Err(SettingsError::UnknownProvider(_))));
    }

    #[test]
    fn test_paths_and_limits() {
        let mut config = AppConfig::default();
        config.general.output = PathBuf::from("from-config.json");
        config.general.max_count = Some(7);
        let args = RunArgs {
            limit: Some(20),
            count: Some(3),
            ..fetch_args()
        };

        let settings = Settings::resolve(&args, &config, no_env(), today()).unwrap();

        assert_eq!(settings.output_path, PathBuf::from("from-config.json"));
        assert_eq!(settings.input_path, PathBuf::from("poems.json"));
        assert_eq!(settings.page_limit, 20);
        assert_eq!(settings.max_count, Some(3));
    }
}
