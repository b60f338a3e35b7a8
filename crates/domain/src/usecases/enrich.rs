//! Poem enrichment use case

use std::sync::Arc;

use crate::{
    model::{
        EnrichedPost, EnrichmentKind, EnrichmentRequest, RawPost, StepFailure, Translation,
        TranslationSubject,
    },
    policy::TagPolicy,
    ports::LanguageModel,
    reply::{self, ModelReply},
};

/// Which optional enrichment steps run
///
/// Correction is not listed: it always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub title: bool,
    pub translation: bool,
    pub tagging: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            title: true,
            translation: true,
            tagging: true,
        }
    }
}

/// Invalid enrichment configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnrichConfigError {
    #[error("Translation is enabled but no target language is set")]
    MissingLanguage,
    #[error("Tagging is enabled but the tag vocabulary is empty")]
    EmptyVocabulary,
}

/// Configuration for the enrich use case
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    features: FeatureFlags,
    language: String,
    tags: TagPolicy,
}

impl EnrichConfig {
    /// Validate feature flags together with the settings they need
    pub fn new(
        features: FeatureFlags,
        language: impl Into<String>,
        tags: TagPolicy,
    ) -> Result<Self, EnrichConfigError> {
        let language = language.into().trim().to_string();

        if features.translation && language.is_empty() {
            return Err(EnrichConfigError::MissingLanguage);
        }
        if features.tagging && tags.is_empty() {
            return Err(EnrichConfigError::EmptyVocabulary);
        }

        Ok(Self {
            features,
            language,
            tags,
        })
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn tags(&self) -> &TagPolicy {
        &self.tags
    }
}

/// Use case for enriching posts through a language model
pub struct Enricher<M: LanguageModel + ?Sized> {
    model: Arc<M>,
    config: EnrichConfig,
}

impl<M: LanguageModel + ?Sized> Enricher<M> {
    pub fn new(model: Arc<M>, config: EnrichConfig) -> Self {
        Self { model, config }
    }

    /// Enrich one post
    ///
    /// Never fails: a step that errors or returns an unusable reply is
    /// recorded in [`EnrichedPost::failures`] and its field is left empty.
    pub async fn enrich(&self, post: &RawPost) -> EnrichedPost {
        let mut enriched = EnrichedPost::bare(post.clone());

        if post.content.trim().is_empty() {
            tracing::warn!(uri = %post.uri, "Post has no content, skipping enrichment");
            return enriched;
        }

        tracing::info!(uri = %post.uri, "Enriching post");

        let cleaned = reply::strip_hashtags(&post.content);

        let corrected = self
            .step(
                &mut enriched,
                EnrichmentRequest::Correction {
                    text: cleaned.clone(),
                },
                reply::parse_text,
            )
            .await;
        let poem = corrected.clone().unwrap_or(cleaned);
        enriched.corrected_text = corrected;

        let features = self.config.features;

        enriched.title = match post.existing_title().map(reply::strip_hashtags) {
            Some(existing) if features.title => {
                self.step(
                    &mut enriched,
                    EnrichmentRequest::Correction { text: existing },
                    reply::parse_title,
                )
                .await
            }
            Some(existing) => reply::parse_title(&existing).parsed(),
            None if features.title => {
                self.step(
                    &mut enriched,
                    EnrichmentRequest::Title { poem: poem.clone() },
                    reply::parse_title,
                )
                .await
            }
            None => None,
        };

        if features.translation {
            enriched.translation = Some(self.translate(&mut enriched, &poem).await);
        }

        if features.tagging {
            enriched.tags = self.tag(&mut enriched, &poem).await;
        }

        enriched
    }

    async fn translate(&self, enriched: &mut EnrichedPost, poem: &str) -> Translation {
        let language = self.config.language.clone();

        let title = match enriched.title.clone() {
            Some(title) => self
                .step(
                    enriched,
                    EnrichmentRequest::Translation {
                        text: title,
                        language: language.clone(),
                        subject: TranslationSubject::Title,
                    },
                    |raw| match reply::parse_translation(raw) {
                        ModelReply::Parsed(text) => ModelReply::Parsed(reply::title_case(&text)),
                        malformed => malformed,
                    },
                )
                .await,
            None => None,
        };

        let text = self
            .step(
                enriched,
                EnrichmentRequest::Translation {
                    text: poem.to_string(),
                    language: language.clone(),
                    subject: TranslationSubject::Poem,
                },
                reply::parse_translation,
            )
            .await;

        Translation {
            language,
            title,
            text,
        }
    }

    async fn tag(&self, enriched: &mut EnrichedPost, poem: &str) -> Option<Vec<String>> {
        let policy = &self.config.tags;
        let request = EnrichmentRequest::Tagging {
            poem: poem.to_string(),
            vocabulary: policy.vocabulary().to_vec(),
        };

        let raw = self.call(enriched, &request).await?;

        let candidates = match reply::parse_tag_list(&raw) {
            ModelReply::Parsed(tags) => tags,
            ModelReply::Malformed(text) => {
                tracing::debug!(reply = %text, "Tag reply is not a JSON list, splitting text");
                reply::split_tag_text(&text)
            }
        };

        Some(policy.sanitize(candidates))
    }

    /// Run one request and parse its reply, recording failures
    async fn step<T>(
        &self,
        enriched: &mut EnrichedPost,
        request: EnrichmentRequest,
        parse: impl Fn(&str) -> ModelReply<T>,
    ) -> Option<T> {
        let kind = request.kind();
        let raw = self.call(enriched, &request).await?;

        match parse(&raw) {
            ModelReply::Parsed(value) => Some(value),
            ModelReply::Malformed(text) => {
                record_failure(enriched, kind, format!("Malformed reply: {:?}", text));
                None
            }
        }
    }

    async fn call(&self, enriched: &mut EnrichedPost, request: &EnrichmentRequest) -> Option<String> {
        let kind = request.kind();
        tracing::debug!(uri = %enriched.post.uri, step = %kind, "Calling language model");

        match self.model.complete(request).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                record_failure(enriched, kind, e.to_string());
                None
            }
        }
    }
}

fn record_failure(enriched: &mut EnrichedPost, kind: EnrichmentKind, reason: String) {
    tracing::warn!(
        uri = %enriched.post.uri,
        step = %kind,
        reason = %reason,
        "Enrichment step failed"
    );
    enriched.failures.push(StepFailure { kind, reason });
}
