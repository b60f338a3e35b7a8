//! Run command - fetch or load posts, select by date, enrich, write JSON

use anyhow::{Context, Result};
use futures::stream;
use poem_enricher_adapters::{
    bluesky::{BlueskyPostSource, FeedOptions},
    llm::{LlmConfig as AdapterLlmConfig, OpenAiModel, StubModel},
    load_posts, write_json,
};
use poem_enricher_domain::{
    Clock, FeedOrder, LanguageModel, PostSourceError, RunSummary, SystemClock,
    usecases::{Enricher, FeedFetcher, Pipeline, PipelineConfig, Selection, WindowFilter},
};
use std::path::Path;
use std::sync::Arc;

use crate::args::RunArgs;
use crate::config::AppConfig;
use crate::settings::{ModelChoice, PostInput, RunMode, Settings};

pub async fn execute(args: RunArgs, config: AppConfig, log_file: Option<&Path>) -> Result<()> {
    let today = SystemClock.now().date();
    let settings = Settings::resolve(&args, &config, |name| std::env::var(name).ok(), today)
        .context("Invalid configuration")?;

    tracing::info!(
        window = ?settings.window,
        today = %settings.today,
        max_count = ?settings.max_count,
        raw = matches!(settings.mode, RunMode::Raw),
        "Starting poem-enricher run"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        filter: WindowFilter::new(settings.window, settings.today),
        max_count: settings.max_count,
    });

    let selection = select_posts(&pipeline, &settings, &config).await?;

    let summary = match &settings.mode {
        RunMode::Raw => {
            write_json(&settings.raw_output_path, &selection.posts)
                .await
                .with_context(|| {
                    format!(
                        "Failed to write raw posts to {}",
                        settings.raw_output_path.display()
                    )
                })?;
            selection.summary
        }
        RunMode::Enrich {
            model,
            config: enrich_config,
        } => {
            let model = build_model(&config, model);
            let enricher = Enricher::new(model, enrich_config.clone());
            let run = pipeline.enrich(selection, &enricher).await;

            write_json(&settings.output_path, &run.posts)
                .await
                .with_context(|| {
                    format!(
                        "Failed to write enriched posts to {}",
                        settings.output_path.display()
                    )
                })?;
            run.summary
        }
    };

    print_summary(&summary, &settings, log_file);
    tracing::info!(
        fetched = summary.fetched,
        selected = summary.selected,
        enriched = summary.enriched,
        step_failures = summary.step_failures,
        "poem-enricher run completed"
    );

    Ok(())
}

async fn select_posts(
    pipeline: &Pipeline,
    settings: &Settings,
    config: &AppConfig,
) -> Result<Selection> {
    match &settings.input {
        PostInput::Fetch(creds) => {
            let source = BlueskyPostSource::with_base_url(
                creds.username.clone(),
                creds.app_password.clone(),
                config.bluesky.service_url.clone(),
                FeedOptions {
                    include_replies: config.bluesky.include_replies,
                    include_reposts: config.bluesky.include_reposts,
                },
            );
            let fetcher = FeedFetcher::new(&source, creds.account.clone(), settings.page_limit);

            let selection = pipeline
                .select(fetcher.stream(), FeedOrder::NewestFirst)
                .await
                .context("Failed to fetch posts from Bluesky")?;

            // Cache for later --no-fetch runs
            if let Err(e) = write_json(&settings.input_path, &selection.posts).await {
                tracing::warn!(error = %e, "Failed to cache fetched posts");
            }

            Ok(selection)
        }
        PostInput::File(path) => {
            let posts = load_posts(path)
                .await
                .with_context(|| format!("Failed to read posts from {}", path.display()))?;

            let posts = stream::iter(posts.into_iter().map(Ok::<_, PostSourceError>));
            let selection = pipeline
                .select(posts, FeedOrder::Unordered)
                .await
                .context("Failed to select posts")?;

            Ok(selection)
        }
    }
}

fn build_model(config: &AppConfig, choice: &ModelChoice) -> Arc<dyn LanguageModel> {
    match choice {
        ModelChoice::OpenAi { api_key } => Arc::new(OpenAiModel::with_base_url(
            api_key.clone(),
            config.llm.base_url.clone(),
            adapter_llm_config(&config.llm),
        )),
        ModelChoice::Stub => Arc::new(StubModel::echo()),
    }
}

fn adapter_llm_config(config: &crate::config::LlmConfig) -> AdapterLlmConfig {
    AdapterLlmConfig {
        model: config.model.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
        timeout_secs: config.timeout_secs,
        retries: config.retries,
    }
}

fn print_summary(summary: &RunSummary, settings: &Settings, log_file: Option<&Path>) {
    println!("Posts fetched:  {}", summary.fetched);
    println!("Posts selected: {}", summary.selected);
    if let RunMode::Enrich { .. } = settings.mode {
        println!("Posts enriched: {}", summary.enriched);
        println!("Step failures:  {}", summary.step_failures);
    }
    println!("Output written: {}", settings.destination().display());
    if let Some(path) = log_file {
        println!("Log file:       {}", path.display());
    }
}
