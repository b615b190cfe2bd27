use super::models::{GenerationRequest, LlmResponse, Usage};
use super::GenerationService;
use crate::config::Config;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat client (xAI by default).
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Rate limit retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const BACKOFF_MULTIPLIER: u64 = 2;

impl ChatClient {
    /// Build a client from config. Fails before any work when no key is available.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let api_key = config.api_key()?;
        Ok(Self {
            http: reqwest::Client::new(),
            url: chat_url(&config.api_base_url),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn chat_url(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

/// Extract a retry-after hint from an error body (if present)
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    text_lower[pos..]
        .split_whitespace()
        .skip(1)
        .take(5)
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_ascii_digit())
                .parse::<u64>()
                .ok()
        })
        .find(|secs| *secs > 0 && *secs < 300)
}

fn backoff_secs(retry_count: u32) -> u64 {
    INITIAL_BACKOFF_SECS * BACKOFF_MULTIPLIER.pow(retry_count.saturating_sub(1))
}

fn describe_status(status: reqwest::StatusCode, body: &str, retries: u32) -> String {
    match status.as_u16() {
        401 => format!(
            "Invalid API key. Set {} or update the config file.",
            crate::config::API_KEY_ENV
        ),
        429 => format!(
            "Rate limited after {} retries. Try again in a few minutes.",
            retries
        ),
        500..=599 => format!(
            "Server error ({}). The service may be temporarily unavailable.",
            status
        ),
        _ => format!("API error {}: {}", status, crate::util::truncate(body, 200)),
    }
}

impl GenerationService for ChatClient {
    /// Includes automatic retry with exponential backoff for rate limits
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<LlmResponse> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let mut retry_count = 0;
        loop {
            let response = self
                .http
                .post(&self.url)
                .header("Content-Type", "application/json")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to parse chat response: {}\n{}",
                        e,
                        crate::util::truncate(&text, 500)
                    )
                })?;

                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();

                return Ok(LlmResponse {
                    content,
                    usage: parsed.usage,
                    model: parsed.model.unwrap_or_else(|| self.model.clone()),
                });
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let wait = parse_retry_after(&text).unwrap_or_else(|| backoff_secs(retry_count));
                tracing::warn!(
                    purpose = %request.purpose,
                    "rate limited; retrying in {}s (attempt {}/{})",
                    wait,
                    retry_count,
                    MAX_RETRIES
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return Err(anyhow::anyhow!(
                "{}",
                describe_status(status, &text, retry_count)
            ));
        }
    }
}
