//! Stub language model for testing and offline mode

use async_trait::async_trait;
use poem_enricher_domain::{EnrichmentRequest, LanguageModel, ModelError, TranslationSubject};

/// Stub model that returns configurable completions
pub struct StubModel {
    reply: Option<String>,
    error: Option<ModelError>,
}

impl StubModel {
    /// Create a stub that derives a plausible completion from each request
    pub fn echo() -> Self {
        Self {
            reply: None,
            error: None,
        }
    }

    /// Create a stub that answers every request with the same text
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            error: None,
        }
    }

    /// Create a stub that always returns an error
    pub fn with_error(error: ModelError) -> Self {
        Self {
            reply: None,
            error: Some(error),
        }
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, ModelError> {
        if let Some(ref error) = self.error {
            return Err(match error {
                ModelError::Api(msg) => ModelError::Api(msg.clone()),
                ModelError::InvalidFormat(msg) => ModelError::InvalidFormat(msg.clone()),
                ModelError::RateLimited => ModelError::RateLimited,
                ModelError::Timeout => ModelError::Timeout,
            });
        }

        if let Some(ref reply) = self.reply {
            return Ok(reply.clone());
        }

        let reply = match request {
            EnrichmentRequest::Correction { text } => text.trim().to_string(),
            EnrichmentRequest::Title { poem } => poem
                .split_whitespace()
                .take(3)
                .collect::<Vec<_>>()
                .join(" "),
            EnrichmentRequest::Translation {
                text,
                language,
                subject: TranslationSubject::Title,
            } => format!("{} ({})", text, language),
            EnrichmentRequest::Translation { text, language, .. } => {
                format!("[{}] {}", language, text)
            }
            EnrichmentRequest::Tagging { poem, vocabulary } => {
                // Vocabulary words that appear in the poem
                let poem_lower = poem.to_lowercase();
                let tags: Vec<&String> = vocabulary
                    .iter()
                    .filter(|tag| poem_lower.contains(tag.as_str()))
                    .collect();
                serde_json::to_string(&tags)
                    .map_err(|e| ModelError::InvalidFormat(e.to_string()))?
            }
        };

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagging() -> EnrichmentRequest {
        EnrichmentRequest::Tagging {
            poem: "A sad little haiku about rain".to_string(),
            vocabulary: vec![
                "sad".to_string(),
                "haiku".to_string(),
                "whimsical".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_echo_tags_from_vocabulary() {
        let model = StubModel::echo();
        let reply = model.complete(&tagging()).await.unwrap();

        assert_eq!(reply, r#"["sad","haiku"]"#);
    }

    #[tokio::test]
    async fn test_echo_translation_mentions_language() {
        let model = StubModel::echo();
        let reply = model
            .complete(&EnrichmentRequest::Translation {
                text: "Rain on the roof.".to_string(),
                language: "French".to_string(),
                subject: TranslationSubject::Poem,
            })
            .await
            .unwrap();

        assert_eq!(reply, "[French] Rain on the roof.");
    }

    #[tokio::test]
    async fn test_configured_reply() {
        let model = StubModel::with_reply("happy, confused");
        let reply = model.complete(&tagging()).await.unwrap();

        assert_eq!(reply, "happy, confused");
    }

    #[tokio::test]
    async fn test_error_stub() {
        let model = StubModel::with_error(ModelError::Timeout);
        let result = model.complete(&tagging()).await;

        assert!(matches!(result, Err(ModelError::Timeout)));
    }
}
