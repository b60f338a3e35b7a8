//! Pipeline use case - selects posts by date and enriches them in order

use futures::stream::{Stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    model::{EnrichedPost, FeedOrder, RawPost, RunSummary},
    ports::{LanguageModel, PostSourceError},
    usecases::{enrich::Enricher, window::WindowFilter},
};

/// Configuration for the pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Date window applied to incoming posts
    pub filter: WindowFilter,
    /// Maximum number of posts selected (None = no limit)
    pub max_count: Option<usize>,
}

/// Posts selected from a source, with counters
#[derive(Debug, Clone)]
pub struct Selection {
    pub posts: Vec<RawPost>,
    pub summary: RunSummary,
}

/// Enriched posts in processing order, with counters
#[derive(Debug)]
pub struct EnrichedRun {
    pub posts: Vec<EnrichedPost>,
    pub summary: RunSummary,
}

/// Pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Pull posts through the date window and count limit
    ///
    /// Stops polling `posts` as soon as the limit is reached or, for
    /// newest-first input, once the window has been passed.
    pub async fn select<S>(&self, posts: S, order: FeedOrder) -> Result<Selection, PostSourceError>
    where
        S: Stream<Item = Result<RawPost, PostSourceError>> + Send,
    {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let counted = posts.inspect(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        let windowed = self.config.filter.apply(counted, order);
        let selected: Vec<RawPost> = match self.config.max_count {
            Some(max) => windowed.take(max).try_collect().await?,
            None => windowed.try_collect().await?,
        };

        let summary = RunSummary {
            fetched: pulled.load(Ordering::Relaxed),
            selected: selected.len(),
            ..Default::default()
        };

        tracing::info!(
            fetched = summary.fetched,
            selected = summary.selected,
            max_count = ?self.config.max_count,
            "Selected posts"
        );

        Ok(Selection {
            posts: selected,
            summary,
        })
    }

    /// Enrich selected posts one at a time, preserving order
    pub async fn enrich<M>(&self, selection: Selection, enricher: &Enricher<M>) -> EnrichedRun
    where
        M: LanguageModel + ?Sized,
    {
        let mut summary = selection.summary;
        let mut posts = Vec::with_capacity(selection.posts.len());

        for (index, post) in selection.posts.iter().enumerate() {
            tracing::info!(
                index = index + 1,
                total = selection.posts.len(),
                uri = %post.uri,
                "Processing post"
            );

            let enriched = enricher.enrich(post).await;
            summary.step_failures += enriched.failures.len();
            summary.enriched += 1;
            posts.push(enriched);
        }

        tracing::info!(
            enriched = summary.enriched,
            step_failures = summary.step_failures,
            "Enrichment complete"
        );

        EnrichedRun { posts, summary }
    }
}
