//! Minimal client for OpenAI-compatible chat completions (Groq by default).
//!
//! The survey only needs plain-text completions: one user message, optionally
//! preceded by a system message. Calls are instrumented and log model names,
//! latencies, token usage and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::error::{ConfigError, LlmError};

/// Text-completion seam used by the evaluator and the scorer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
  /// Send `prompt` (and `system` when non-empty) and return the trimmed reply.
  async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub max_retries: u32,
}

pub(crate) fn env_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
  match std::env::var(name) {
    Ok(v) => v.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnv { name, value: v }),
    Err(_) => Ok(default),
  }
}

impl OpenAI {
  /// Build the client from LLM_* variables. The API key is mandatory
  /// (LLM_API_KEY, or GROQ_API_KEY as a fallback).
  pub fn from_env() -> Result<Self, ConfigError> {
    let api_key = std::env::var("LLM_API_KEY")
      .or_else(|_| std::env::var("GROQ_API_KEY"))
      .map_err(|_| ConfigError::MissingEnv("LLM_API_KEY"))?;
    let base_url =
      std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.groq.com/openai/v1".into());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gemma2-9b-it".into());
    let temperature = env_or("LLM_TEMPERATURE", 0.0f32)?;
    let max_retries = env_or("LLM_MAX_RETRIES", 2u32)?;
    let timeout_secs = env_or("LLM_TIMEOUT_SECS", 30u64)?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| ConfigError::Client(e.to_string()))?;

    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model, temperature, max_retries })
  }

  /// One chat.completions round trip, no retries.
  async fn chat_plain_once(&self, system: &str, user: &str) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let mut messages = Vec::with_capacity(2);
    if !system.trim().is_empty() {
      messages.push(ChatMessageReq { role: "system".into(), content: system.into() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: user.into() });
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature: self.temperature,
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "esg-profiler-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| LlmError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(LlmError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    if text.is_empty() { Err(LlmError::Empty) } else { Ok(text) }
  }
}

fn is_retryable(e: &LlmError) -> bool {
  match e {
    LlmError::Transport(_) => true,
    LlmError::Http { status, .. } => *status == 429 || *status >= 500,
    LlmError::Empty => false,
  }
}

const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// 500ms doubling per attempt, capped.
fn retry_backoff(attempt: u32) -> Duration {
  Duration::from_millis(2u64.saturating_pow(attempt).saturating_mul(500)).min(MAX_BACKOFF)
}

#[async_trait]
impl LlmGateway for OpenAI {
  #[instrument(level = "info", skip(self, system, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
    let mut attempt = 0u32;
    loop {
      let start = Instant::now();
      match self.chat_plain_once(system, prompt).await {
        Ok(text) => {
          info!(elapsed = ?start.elapsed(), attempt, response_len = text.len(), "LLM completion received");
          return Ok(text);
        }
        Err(e) if attempt < self.max_retries && is_retryable(&e) => {
          let backoff = retry_backoff(attempt);
          warn!(elapsed = ?start.elapsed(), attempt, ?backoff, error = %e, "LLM call failed; retrying");
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
        Err(e) => {
          error!(elapsed = ?start.elapsed(), attempt, error = %e, "LLM call failed");
          return Err(e);
        }
      }
    }
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

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
