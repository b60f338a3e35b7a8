//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};

/// A post as fetched from the source platform (e.g., Bluesky)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPost {
    /// Post text content
    pub content: String,
    /// Creation timestamp as reported by the source (RFC 3339)
    pub published_at: String,
    /// Hashtags attached to the post, space separated
    #[serde(default)]
    pub tags: String,
    /// Record URI (e.g., at://did:plc:.../app.bsky.feed.post/...)
    #[serde(default)]
    pub uri: String,
    /// Content identifier of the record version
    #[serde(default)]
    pub cid: String,
    /// Title carried by a hand-edited input file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// English title left by an earlier enrichment run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RawPost {
    /// Parsed creation timestamp, if the source value is well formed
    pub fn published(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(self.published_at.trim(), &Rfc3339).ok()
    }

    /// Title already present on the post, `title_en` first
    pub fn existing_title(&self) -> Option<&str> {
        [&self.title_en, &self.title]
            .into_iter()
            .flatten()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
    }

    /// Calendar date of publication in UTC
    pub fn published_date(&self) -> Option<Date> {
        if let Some(ts) = self.published() {
            return Some(ts.to_offset(UtcOffset::UTC).date());
        }

        // Some clients omit the offset; fall back to the date prefix.
        let prefix = self.published_at.trim().get(..10)?;
        let format = time::format_description::parse("[year]-[month]-[day]").ok()?;
        Date::parse(prefix, &format).ok()
    }
}

/// One page of a cursor-paginated feed
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    /// Posts on this page, newest first
    pub posts: Vec<RawPost>,
    /// Opaque cursor for the next page, if any
    pub cursor: Option<String>,
}

/// Ordering guarantee of a post sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    /// Reverse-chronological, as produced by the source feed
    NewestFirst,
    /// No ordering guarantee (e.g., a hand-edited input file)
    Unordered,
}

/// The kind of a single language-model enrichment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentKind {
    Correction,
    Title,
    Translation,
    Tagging,
}

impl fmt::Display for EnrichmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrichmentKind::Correction => "correction",
            EnrichmentKind::Title => "title",
            EnrichmentKind::Translation => "translation",
            EnrichmentKind::Tagging => "tagging",
        };
        f.write_str(name)
    }
}

/// What a translation request is translating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationSubject {
    Poem,
    Title,
}

/// A single language-model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentRequest {
    /// Fix capitalization and punctuation without changing words
    Correction { text: String },
    /// Generate a short title for a poem
    Title { poem: String },
    /// Translate a poem or a title into the target language
    Translation {
        text: String,
        language: String,
        subject: TranslationSubject,
    },
    /// Pick tags for a poem from a closed vocabulary
    Tagging {
        poem: String,
        vocabulary: Vec<String>,
    },
}

impl EnrichmentRequest {
    pub fn kind(&self) -> EnrichmentKind {
        match self {
            EnrichmentRequest::Correction { .. } => EnrichmentKind::Correction,
            EnrichmentRequest::Title { .. } => EnrichmentKind::Title,
            EnrichmentRequest::Translation { .. } => EnrichmentKind::Translation,
            EnrichmentRequest::Tagging { .. } => EnrichmentKind::Tagging,
        }
    }

}

/// Translated fields for the configured target language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Target language as configured (e.g., "Italian")
    pub language: String,
    pub title: Option<String>,
    pub text: Option<String>,
}

/// A recovered failure of one enrichment step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: EnrichmentKind,
    pub reason: String,
}

/// A raw post plus model-derived fields
///
/// Serialization lives in [`crate::record`] because translated field names
/// depend on the target language.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedPost {
    /// The source post, unchanged
    pub post: RawPost,
    /// Grammar-corrected poem text
    pub corrected_text: Option<String>,
    /// Generated English title
    pub title: Option<String>,
    pub translation: Option<Translation>,
    /// Tags drawn from the vocabulary
    pub tags: Option<Vec<String>>,
    pub category: String,
    /// Steps that failed for this post (not serialized)
    pub failures: Vec<StepFailure>,
}

impl EnrichedPost {
    pub const DEFAULT_CATEGORY: &'static str = "Uncategorized";

    /// An enriched post carrying only the raw fields
    pub fn bare(post: RawPost) -> Self {
        Self {
            corrected_text: None,
            title: None,
            translation: None,
            tags: None,
            category: post
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(Self::DEFAULT_CATEGORY)
                .to_string(),
            post,
            failures: Vec::new(),
        }
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Posts pulled from the source or input file
    pub fetched: usize,
    /// Posts inside the date window (after the count limit)
    pub selected: usize,
    /// Posts that went through enrichment
    pub enriched: usize,
    /// Enrichment steps that failed and were skipped
    pub step_failures: usize,
}
