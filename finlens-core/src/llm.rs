//! Language-model capability: prompt in, text out.

use crate::config::LlmConfig;
use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Which of the two configured models serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    Default,
    Alternate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub max_output_tokens: u32,
    pub backend: ModelBackend,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            backend: ModelBackend::Default,
        }
    }
}

pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, LlmError>;

    /// Model identifier for logging
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (OpenRouter by default).
///
/// One attempt per call: timeouts and HTTP errors come straight back to the
/// caller.
pub struct OpenRouterClient {
    base_url: String,
    default_model: String,
    alternate_model: String,
    api_key: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.default_model.clone(),
            alternate_model: config.alternate_model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn model_for(&self, backend: ModelBackend) -> &str {
        match backend {
            ModelBackend::Default => &self.default_model,
            ModelBackend::Alternate => &self.alternate_model,
        }
    }
}

impl LanguageModel for OpenRouterClient {
    fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, LlmError> {
        let model = self.model_for(options.backend);
        let body = ChatRequest {
            model,
            temperature: self.temperature,
            max_tokens: options.max_output_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        debug!(model, prompt_chars = prompt.len(), "chat completion request");

        let response = ureq::post(&format!("{}/chat/completions", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key.trim()))
            .set("content-type", "application/json")
            .set("X-Title", "finlens")
            .timeout(self.timeout)
            .send_json(&body)
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => LlmError::Status {
                    status,
                    body: response
                        .into_string()
                        .unwrap_or_else(|_| "<body unavailable>".to_string()),
                },
                ureq::Error::Transport(transport) => LlmError::Transport(transport.to_string()),
            })?;

        let parsed: ChatResponse = response
            .into_json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("no choices in response".to_string()))
    }

    fn name(&self) -> &str {
        &self.default_model
    }
}
