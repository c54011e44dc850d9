//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions, as plain text, strict JSON object, or with an
//! image/PDF part for page extraction. Calls are instrumented and log model
//! names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or base64 payloads.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::completion::{Attachment, CompletionError, CompletionRequest, CompletionService, ModelKind};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub text_model: String,
  pub vision_model: String,
  pub timeout_secs: u64,
  pub max_retries: u32,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let text_model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let vision_model = std::env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout_secs = env_parse("OPENAI_TIMEOUT_SECS", 60u64).max(1);
    let max_retries = env_parse("OPENAI_MAX_RETRIES", 2u32).min(5);

    let client = reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build().ok()?;

    Some(Self { client, api_key, base_url, text_model, vision_model, timeout_secs, max_retries })
  }

  fn model_for(&self, kind: ModelKind) -> &str {
    match kind {
      ModelKind::Text => &self.text_model,
      ModelKind::Vision => &self.vision_model,
    }
  }

  /// One HTTP round trip, no retry.
  async fn send_once(&self, body: &ChatCompletionRequest) -> Result<String, CompletionError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "clarity-coach-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(body)
      .send()
      .await
      .map_err(|e| self.map_transport(e))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(CompletionError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| {
      if e.is_timeout() {
        CompletionError::Timeout(self.timeout_secs)
      } else {
        CompletionError::InvalidJson(e.to_string())
      }
    })?;
    if let Some(usage) = &body.usage {
      info!(target: "clarity_coach", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .unwrap_or_default()
      .trim()
      .to_string();
    if text.is_empty() {
      return Err(CompletionError::EmptyResponse);
    }
    Ok(text)
  }

  fn map_transport(&self, e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
      CompletionError::Timeout(self.timeout_secs)
    } else {
      CompletionError::Transport(e.to_string())
    }
  }
}

#[async_trait]
impl CompletionService for OpenAI {
  #[instrument(
    level = "info",
    skip(self, req),
    fields(model = %self.model_for(req.model), json = req.json_mode, attachments = req.attachments.len(), user_len = req.user.len())
  )]
  async fn complete(&self, req: CompletionRequest) -> Result<String, CompletionError> {
    let body = ChatCompletionRequest::from_request(self.model_for(req.model), &req);
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
      match self.send_once(&body).await {
        Ok(text) => {
          info!(target: "clarity_coach", elapsed = ?start.elapsed(), attempt, resp_len = text.len(), "Model response received");
          return Ok(text);
        }
        Err(e) if e.is_retryable() && attempt < self.max_retries => {
          let delay = Duration::from_millis(250u64 << attempt);
          warn!(target: "clarity_coach", attempt, ?delay, error = %e, "Model call failed; retrying");
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => {
          warn!(target: "clarity_coach", elapsed = ?start.elapsed(), attempt, error = %e, "Model call failed");
          return Err(e);
        }
      }
    }
  }

  fn describe(&self) -> String {
    format!("openai text={} vision={} base_url={}", self.text_model, self.vision_model, self.base_url)
  }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
  std::env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

impl ChatCompletionRequest {
  fn from_request(model: &str, req: &CompletionRequest) -> Self {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &req.system {
      messages.push(ChatMessageReq { role: "system", content: MessageContent::Text(system.clone()) });
    }
    let user = if req.attachments.is_empty() {
      MessageContent::Text(req.user.clone())
    } else {
      let mut parts = vec![ContentPart::Text { text: req.user.clone() }];
      parts.extend(req.attachments.iter().map(ContentPart::from));
      MessageContent::Parts(parts)
    };
    messages.push(ChatMessageReq { role: "user", content: user });

    Self {
      model: model.to_string(),
      messages,
      temperature: req.temperature,
      response_format: req.json_mode.then(|| ResponseFormat { r#type: "json_object".into() }),
    }
  }
}

#[derive(Serialize)]
struct ChatMessageReq {
  role: &'static str,
  content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  ImageUrl { image_url: ImageUrl },
  File { file: FileData },
}

#[derive(Serialize)]
struct ImageUrl {
  url: String,
}

#[derive(Serialize)]
struct FileData {
  filename: String,
  file_data: String,
}

impl From<&Attachment> for ContentPart {
  fn from(a: &Attachment) -> Self {
    match a {
      Attachment::Image { mime, base64 } => {
        ContentPart::ImageUrl { image_url: ImageUrl { url: format!("data:{};base64,{}", mime, base64) } }
      }
      Attachment::Pdf { filename, base64 } => ContentPart::File {
        file: FileData { filename: filename.clone(), file_data: format!("data:application/pdf;base64,{}", base64) },
      },
    }
  }
}

#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
