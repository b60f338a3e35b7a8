//! Language-model adapters

pub mod openai;
pub mod stub;

pub use openai::OpenAiModel;
pub use stub::StubModel;

use poem_enricher_domain::{EnrichmentRequest, TranslationSubject};
use serde::{Deserialize, Serialize};

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Temperature (0.0-2.0), provider default when unset
    pub temperature: Option<f64>,
    /// Maximum output tokens, provider default when unset
    pub max_output_tokens: Option<u32>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries on failure or refusal
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: None,
            max_output_tokens: None,
            timeout_secs: 45,
            retries: 2,
        }
    }
}

/// System and user messages for one chat completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Build the chat prompt for an enrichment request
pub fn build_prompt(request: &EnrichmentRequest) -> Prompt {
    match request {
        EnrichmentRequest::Correction { text } => Prompt {
            system: "You are a helpful assistant that corrects capitalization and punctuation \
                     in English text. Do not change the words, only fix the grammar."
                .to_string(),
            user: text.clone(),
        },
        EnrichmentRequest::Title { poem } => Prompt {
            system: "You are a creative poetry title generator. Create simple, clever, \
                     and memorable titles for poems."
                .to_string(),
            user: format!(
                "Create a short, engaging title for this poem. The title should:\n\
                 1. Be concise (1-5 words)\n\
                 2. Use alliteration if possible\n\
                 3. Capture the essence or main emotion\n\
                 4. Not use hashtags or special characters\n\n\
                 Poem:\n{}\n\n\
                 Return ONLY the title, nothing else.",
                poem
            ),
        },
        EnrichmentRequest::Translation {
            text,
            language,
            subject: TranslationSubject::Title,
        } => Prompt {
            system: format!(
                "You are a highly skilled translator of English text to {}.",
                language
            ),
            user: format!(
                "Directly translate this English poetry title to {} and return ONLY the \
                 translation, nothing else. No quotes, explanations, or arrows. Title: '{}'",
                language, text
            ),
        },
        EnrichmentRequest::Translation {
            text,
            language,
            subject: TranslationSubject::Poem,
        } => Prompt {
            system: format!(
                "You are a highly skilled translator of English poetry to {}.",
                language
            ),
            user: format!(
                "Translate thoughtfully, considering the poem's context, style, and intention. \
                 Capture the essence and feeling of the poem. Return ONLY the translation. \
                 Source:\n{}",
                text
            ),
        },
        EnrichmentRequest::Tagging { poem, vocabulary } => Prompt {
            system: format!(
                "You are an expert in poetry analysis. Analyze the following poem and select \
                 up to 5 tags that best describe it from this list: {}. \
                 Respond with ONLY a JSON array of lowercase strings taken from the list, \
                 for example [\"{}\"].",
                vocabulary.join(", "),
                vocabulary.first().map(String::as_str).unwrap_or("tag")
            ),
            user: poem.clone(),
        },
    }
}

/// Whether a completion is an apology instead of an answer
pub fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("i'm sorry") || lower.contains("i’m sorry")
}
