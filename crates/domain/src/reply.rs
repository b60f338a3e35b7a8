//! Interpretation of raw model completions
//!
//! Every enrichment step parses its completion into a [`ModelReply`]. Only
//! tagging has a fallback for malformed replies; the other steps treat
//! `Malformed` as a failure of that step.

use regex::Regex;
use std::sync::LazyLock;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern compiles"));

static TITLE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern compiles"));

/// Result of parsing one completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply<T> {
    /// The completion had the expected shape
    Parsed(T),
    /// The completion could not be interpreted; carries the raw text
    Malformed(String),
}

impl<T> ModelReply<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            ModelReply::Parsed(value) => Some(value),
            ModelReply::Malformed(_) => None,
        }
    }
}

/// Plain text reply (correction, poem translation)
pub fn parse_text(raw: &str) -> ModelReply<String> {
    let text = raw.trim();
    if text.is_empty() {
        ModelReply::Malformed(raw.to_string())
    } else {
        ModelReply::Parsed(text.to_string())
    }
}

/// Title reply: punctuation removed, title cased
pub fn parse_title(raw: &str) -> ModelReply<String> {
    let cleaned = TITLE_PUNCTUATION.replace_all(raw.trim(), "");
    let title = title_case(&cleaned);
    if title.is_empty() {
        ModelReply::Malformed(raw.to_string())
    } else {
        ModelReply::Parsed(title)
    }
}

/// Translation reply: surrounding quotes removed
pub fn parse_translation(raw: &str) -> ModelReply<String> {
    let text = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if text.is_empty() {
        ModelReply::Malformed(raw.to_string())
    } else {
        ModelReply::Parsed(text.to_string())
    }
}

/// Tagging reply: a JSON array of strings, possibly inside a code block
pub fn parse_tag_list(raw: &str) -> ModelReply<Vec<String>> {
    match serde_json::from_str::<Vec<String>>(extract_json(raw)) {
        Ok(tags) => ModelReply::Parsed(tags),
        Err(_) => ModelReply::Malformed(raw.to_string()),
    }
}

/// Fallback for tag replies that are not a JSON list ("happy, sad")
pub fn split_tag_text(raw: &str) -> Vec<String> {
    raw.split([',', '\n', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replace `#word` hashtags with the bare word
pub fn strip_hashtags(text: &str) -> String {
    HASHTAG.replace_all(text, "$1").into_owned()
}

/// Capitalize the first letter of every whitespace-separated word
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Extract JSON from response (handles markdown code blocks)
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Check for ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return trimmed[start + 7..start + 7 + end].trim();
        }
    }

    // Check for ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let content = trimmed[start + 3..start + 3 + end].trim();
            // Skip language identifier if present
            if let Some(newline) = content.find('\n') {
                let first_line = &content[..newline];
                if !first_line.starts_with('[') {
                    return content[newline + 1..].trim();
                }
            }
            return content;
        }
    }

    trimmed
}
