//! Tag vocabulary constraints for model outputs

use std::collections::HashSet;

/// Default maximum number of tags kept per post
pub const DEFAULT_MAX_TAGS: usize = 5;

/// Closed set of tags a post may be labelled with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    vocabulary: Vec<String>,
    max_tags: usize,
}

impl TagPolicy {
    /// Build a policy from a vocabulary; entries are normalized and de-duplicated
    pub fn new<I, S>(vocabulary: I, max_tags: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let vocabulary = vocabulary
            .into_iter()
            .map(|tag| normalize_tag(tag.as_ref()))
            .filter(|tag| !tag.is_empty())
            .filter(|tag| seen.insert(tag.clone()))
            .collect();

        Self {
            vocabulary,
            max_tags,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.vocabulary.iter().any(|t| *t == tag)
    }

    /// Keep only vocabulary members, in candidate order, without duplicates
    pub fn sanitize<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        for candidate in candidates {
            let tag = normalize_tag(candidate.as_ref());
            if tag.is_empty() || kept.contains(&tag) {
                continue;
            }
            if !self.vocabulary.contains(&tag) {
                tracing::debug!(tag = %tag, "Dropping tag outside vocabulary");
                continue;
            }
            kept.push(tag);
            if kept.len() >= self.max_tags {
                break;
            }
        }
        kept
    }
}

/// Lowercase and strip decoration models like to add around tags
fn normalize_tag(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '#' | '.' | '[' | ']' | '-' | '*'))
        .trim()
        .to_lowercase()
}
