/// LLM Client: the single point of entry for all inference-service calls in Resly.
///
/// ARCHITECTURAL RULE: No other module may call the Groq API directly.
/// All inference goes through the `InferenceService` trait defined here.
///
/// Model: llama-3.3-70b-versatile (hardcoded, not configurable)
use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
pub mod mock;
pub mod sse;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// The model used for all inference calls in Resly.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "llama-3.3-70b-versatile";

/// Transport and service failures. Malformed *content* is not represented here:
/// whatever text the model produced is handed back to the caller untouched.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("LLM returned no choices")]
    EmptyContent,
}

/// Sampling parameters sent with every inference request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the service to constrain output to a single JSON object.
    pub json_mode: bool,
}

impl Default for SamplingConfig {
    /// Low randomness, bounded output, JSON only.
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 2000,
            json_mode: true,
        }
    }
}

/// Text fragments of one streaming inference session, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// The inference service as seen by the analysis pipeline.
///
/// Carried in `AppState` as `Arc<dyn InferenceService>` so tests can swap in
/// a scripted implementation.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// One-shot call returning the complete text payload.
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LlmError>;

    /// Streaming call returning text fragments as they are produced.
    async fn stream(
        &self,
        system: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<FragmentStream, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub(crate) message: String,
}

/// The production inference client. Wraps Groq's OpenAI-compatible
/// chat-completions API. Does not retry; retry policy belongs to callers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    fn request<'a>(
        system: &'a str,
        prompt: &'a str,
        sampling: &SamplingConfig,
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            response_format: sampling.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
            stream,
        }
    }

    /// Sends a chat request and rejects any non-success status.
    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl InferenceService for LlmClient {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, LlmError> {
        let request = Self::request(system, prompt, sampling, false);
        let response: ChatResponse = self.send(&request).await?.json().await?;

        if let Some(usage) = &response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}, total_tokens={}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyContent)?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(
        &self,
        system: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<FragmentStream, LlmError> {
        let request = Self::request(system, prompt, sampling, true);
        let response = self.send(&request).await?;
        debug!("LLM stream opened");
        Ok(sse::fragments(response.bytes_stream()))
    }
}

/// Strips code fences from model output and isolates the outermost JSON object.
///
/// Removes a leading ```` ```json ```` / ```` ``` ```` and a trailing ```` ``` ````,
/// then keeps the span from the first `{` through the last `}` when both exist.
pub fn clean_json_content(text: &str) -> &str {
    let mut cleaned = text.trim();

    if cleaned
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("```json"))
    {
        cleaned = cleaned[7..].trim_start();
    } else if let Some(stripped) = cleaned.strip_prefix("```") {
        cleaned = stripped.trim_start();
    }
    if let Some(stripped) = cleaned.strip_suffix("```") {
        cleaned = stripped.trim_end();
    }
    let cleaned = cleaned.trim();

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(first), Some(last)) if last > first => &cleaned[first..=last],
        _ => cleaned,
    }
}
