//! Minimal client for OpenAI-compatible `/chat/completions` endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use clientintel_shared::{ClientIntelError, Credentials, ModelConfig, Result, parse_url};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("ClientIntel/", env!("CARGO_PKG_VERSION"));

/// Everything needed to construct a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Base URL; `/chat/completions` is appended.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ModelOptions {
    /// Merge the `[model]` config section with loaded credentials.
    pub fn from_config(config: &ModelConfig, credentials: &Credentials) -> Self {
        Self {
            api_base: config.api_base.clone(),
            api_key: credentials.model_api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends one user message and returns the first choice's text.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    url: Url,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(opts: ModelOptions) -> Result<Self> {
        let url = parse_url(
            "model.api_base",
            &format!("{}/chat/completions", opts.api_base.trim_end_matches('/')),
        )?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(opts.timeout)
            .build()
            .map_err(|e| ClientIntelError::Model(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            api_key: opts.api_key,
            model: opts.model,
            temperature: opts.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user message.
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientIntelError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(ClientIntelError::Model(format!("HTTP {status}: {excerpt}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientIntelError::Model(format!("invalid response body: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClientIntelError::Model("response has no message content".into()))?;

        debug!(chars = text.len(), "model responded");
        Ok(text)
    }
}
