//! # LLM Gateway
//!
//! Single-attempt text completion against an Anthropic-style `/v1/messages`
//! endpoint. Failures are not retried; the caller decides what to do.
//!
//! Request:
//! ```json
//! { "model": "...", "max_tokens": 2000, "messages": [{ "role": "user", "content": "..." }] }
//! ```
//!
//! Response (only the first text block is used):
//! ```json
//! { "content": [{ "type": "text", "text": "..." }] }
//! ```
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{config::Config, error::AppError};

pub const API_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AppError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct AnthropicGateway {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicGateway {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| AppError::Gateway(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/v1/messages", config.llm_base_url.trim_end_matches('/')),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
        })
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        info!("Requesting completion from {}", self.model);

        let res = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            warn!("LLM endpoint returned {status}: {detail}");

            return Err(AppError::Gateway(format!("{status}: {detail}")));
        }

        let response: MessagesResponse = res
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid response body: {e}")))?;

        first_text(response)
    }
}

fn first_text(response: MessagesResponse) -> Result<String, AppError> {
    response
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or_else(|| AppError::Gateway("Response contained no text".to_string()))
}
