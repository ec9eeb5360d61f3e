//! LLM provider clients.
//!
//! The engine only needs `generate(prompt, options) -> raw text`. Two wire
//! formats cover every supported provider: OpenAI-style chat completions
//! (OpenAI, Mistral, DeepSeek, Together-hosted Llama) and Gemini
//! `generateContent`.
//!
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents). API keys are never logged.

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

const CLIENT_USER_AGENT: &str = "clueboard-backend/0.1";

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
  #[error("authentication failed (HTTP {status}): {message}")]
  Auth { status: u16, message: String },
  #[error("rate limit exceeded: {0}")]
  RateLimit(String),
  #[error("provider server error (HTTP {status}): {message}")]
  Server { status: u16, message: String },
  #[error("network error: {0}")]
  Network(String),
  #[error("request rejected (HTTP {status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("unreadable provider response: {0}")]
  InvalidResponse(String),
}

impl ProviderError {
  /// Maps a non-success HTTP status to an error category.
  pub fn from_status(status: u16, body: &str) -> Self {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
    match status {
      401 | 403 => ProviderError::Auth { status, message },
      429 => ProviderError::RateLimit(message),
      s if s >= 500 => ProviderError::Server { status, message },
      _ => ProviderError::Rejected { status, message },
    }
  }

  /// Whether a caller may reasonably try again.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      ProviderError::RateLimit(_) | ProviderError::Server { .. } | ProviderError::Network(_)
    )
  }

  pub fn category(&self) -> &'static str {
    match self {
      ProviderError::Auth { .. } => "auth",
      ProviderError::RateLimit(_) => "rate_limit",
      ProviderError::Server { .. } => "server",
      ProviderError::Network(_) => "network",
      ProviderError::Rejected { .. } => "rejected",
      ProviderError::InvalidResponse(_) => "invalid_response",
    }
  }
}

impl From<reqwest::Error> for ProviderError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ProviderError::InvalidResponse(e.to_string())
    } else {
      ProviderError::Network(e.to_string())
    }
  }
}

#[derive(Clone, Debug)]
pub struct GenerateOptions {
  pub temperature: f32,
  pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
  fn name(&self) -> &str;
  async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, ProviderError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
  OpenAi,
  Mistral,
  DeepSeek,
  Meta,
  Gemini,
}

impl ProviderKind {
  pub fn default_base_url(&self) -> &'static str {
    match self {
      ProviderKind::OpenAi => "https://api.openai.com/v1",
      ProviderKind::Mistral => "https://api.mistral.ai/v1",
      ProviderKind::DeepSeek => "https://api.deepseek.com/v1",
      ProviderKind::Meta => "https://api.together.xyz/v1",
      ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1",
    }
  }

  pub fn default_model(&self) -> &'static str {
    match self {
      ProviderKind::OpenAi => "gpt-4",
      ProviderKind::Mistral => "mistral-large-latest",
      ProviderKind::DeepSeek => "deepseek-chat",
      ProviderKind::Meta => "meta-llama-3-70b-instruct",
      ProviderKind::Gemini => "gemini-1.5-pro",
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderKind::OpenAi => "openai",
      ProviderKind::Mistral => "mistral",
      ProviderKind::DeepSeek => "deepseek",
      ProviderKind::Meta => "meta",
      ProviderKind::Gemini => "gemini",
    }
  }
}

impl FromStr for ProviderKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "openai" => Ok(ProviderKind::OpenAi),
      "mistral" => Ok(ProviderKind::Mistral),
      "deepseek" => Ok(ProviderKind::DeepSeek),
      "meta" | "together" => Ok(ProviderKind::Meta),
      "gemini" => Ok(ProviderKind::Gemini),
      other => Err(format!("unknown LLM provider '{}'", other)),
    }
  }
}

/// Build the configured provider from env. Returns None if no API key is set.
///
///   LLM_PROVIDER     : openai | mistral | deepseek | meta | gemini (default openai)
///   LLM_API_KEY      : falls back to OPENAI_API_KEY
///   LLM_BASE_URL     : provider default when unset
///   LLM_MODEL        : provider default when unset
///   LLM_TIMEOUT_SECS : default 60
pub fn provider_from_env() -> Option<Arc<dyn LlmProvider>> {
  let api_key = std::env::var("LLM_API_KEY")
    .or_else(|_| std::env::var("OPENAI_API_KEY"))
    .ok()
    .filter(|k| !k.trim().is_empty())?;

  let kind = match std::env::var("LLM_PROVIDER") {
    Ok(s) => match s.parse::<ProviderKind>() {
      Ok(k) => k,
      Err(e) => {
        tracing::error!(target: "clueboard_backend", error = %e, "Invalid LLM_PROVIDER; generation disabled");
        return None;
      }
    },
    Err(_) => ProviderKind::OpenAi,
  };
  let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| kind.default_base_url().into());
  let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| kind.default_model().into());
  let timeout = std::env::var("LLM_TIMEOUT_SECS")
    .ok()
    .and_then(|s| s.parse::<u64>().ok())
    .unwrap_or(60);

  let client = reqwest::Client::builder()
    .timeout(Duration::from_secs(timeout))
    .build()
    .ok()?;

  info!(target: "clueboard_backend", provider = kind.as_str(), %base_url, %model, "LLM provider enabled");
  let provider: Arc<dyn LlmProvider> = match kind {
    ProviderKind::Gemini => Arc::new(GeminiClient { client, api_key, base_url, model }),
    _ => Arc::new(ChatCompletionsClient { client, api_key, base_url, model, kind }),
  };
  Some(provider)
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct ChatCompletionsClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub kind: ProviderKind,
}

#[async_trait]
impl LlmProvider for ChatCompletionsClient {
  fn name(&self) -> &str {
    self.kind.as_str()
  }

  #[instrument(level = "info", skip(self, prompt, options), fields(provider = self.kind.as_str(), model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature: options.temperature,
      max_tokens: options.max_tokens,
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_USER_AGENT)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(ProviderError::from_status(status, &body));
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| ProviderError::InvalidResponse("no choices in completion".into()))?;

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "LLM response received");
    Ok(text)
  }
}

/// Gemini `models/<model>:generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

#[async_trait]
impl LlmProvider for GeminiClient {
  fn name(&self) -> &str {
    "gemini"
  }

  #[instrument(level = "info", skip(self, prompt, options), fields(provider = "gemini", model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, ProviderError> {
    let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model);
    let req = GeminiRequest {
      contents: vec![GeminiContentReq {
        role: "user".into(),
        parts: vec![GeminiPart { text: prompt.into() }],
      }],
      generation_config: GeminiGenerationConfig {
        temperature: options.temperature,
        max_output_tokens: options.max_tokens,
      },
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, CLIENT_USER_AGENT)
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(ProviderError::from_status(status, &body));
    }

    let body: GeminiResponse = res.json().await?;
    let text = body.candidates.into_iter().next()
      .and_then(|c| c.content.parts.into_iter().next())
      .map(|p| p.text)
      .ok_or_else(|| ProviderError::InvalidResponse("no candidates in response".into()))?;

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "LLM response received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

// --- Gemini DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
  contents: Vec<GeminiContentReq>,
  generation_config: GeminiGenerationConfig,
}
#[derive(Serialize)]
struct GeminiContentReq { role: String, parts: Vec<GeminiPart> }
#[derive(Serialize, Deserialize)]
struct GeminiPart { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
  #[serde(default)] candidates: Vec<GeminiCandidate>,
}
#[derive(Deserialize)]
struct GeminiCandidate { content: GeminiContentResp }
#[derive(Deserialize)]
struct GeminiContentResp {
  #[serde(default)] parts: Vec<GeminiPart>,
}

/// Try to extract a clean error message from a provider error body.
/// Both wire formats use `{"error": {"message": ...}}`.
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
