//! OpenAI Chat Completions API adapter

use async_trait::async_trait;
use poem_enricher_domain::{EnrichmentRequest, LanguageModel, ModelError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmConfig, Prompt, build_prompt, is_refusal};

/// Default OpenAI API root
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Language model backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiModel {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl OpenAiModel {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(api_key: SecretString, base_url: String, config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    async fn call_api(&self, prompt: &Prompt) -> Result<String, ModelError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_output_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    ModelError::Api(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(ModelError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("API returned {}: {}", status, body)));
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidFormat(e.to_string()))?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::InvalidFormat("Empty response".to_string()));
        }

        Ok(text.trim().to_string())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, ModelError> {
        let prompt = build_prompt(request);
        let kind = request.kind();

        tracing::info!(step = %kind, model = %self.config.model, "Calling model");

        let mut declined = None;
        let mut last_error = None;
        for attempt in 0..=self.config.retries {
            if attempt > 0 {
                tracing::warn!(step = %kind, attempt = attempt, "Retrying model call");
                tokio::time::sleep(Duration::from_millis(500 * 2_u64.pow(attempt))).await;
            }

            match self.call_api(&prompt).await {
                Ok(text) if is_refusal(&text) && attempt < self.config.retries => {
                    tracing::warn!(step = %kind, "Model may have declined, will retry");
                    declined = Some(text);
                }
                Ok(text) => return Ok(text),
                Err(ModelError::RateLimited) => {
                    return Err(ModelError::RateLimited);
                }
                Err(e) => {
                    tracing::warn!(step = %kind, error = %e, "Model call failed");
                    last_error = Some(e);
                }
            }
        }

        // An apology may be the poem itself
        if let Some(text) = declined {
            return Ok(text);
        }

        Err(last_error.unwrap_or_else(|| ModelError::Api("Unknown error".to_string())))
    }
}
