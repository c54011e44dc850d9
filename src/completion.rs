//! The text-completion boundary.
//!
//! Everything that talks to a language model goes through [`CompletionService`].
//! `logic` only ever sees this trait, so handlers can be exercised with a
//! scripted fake and no network.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
  /// Text / JSON completions.
  Text,
  /// Page extraction from images and PDFs.
  Vision,
}

/// Binary payloads sent alongside the user message. `base64` is already encoded.
#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
  Image { mime: String, base64: String },
  Pdf { filename: String, base64: String },
}

#[derive(Clone, Debug)]
pub struct CompletionRequest {
  pub system: Option<String>,
  pub user: String,
  /// Ask for a JSON object response.
  pub json_mode: bool,
  pub temperature: f32,
  pub model: ModelKind,
  pub attachments: Vec<Attachment>,
}

impl CompletionRequest {
  pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
    Self {
      system: Some(system.into()),
      user: user.into(),
      json_mode: false,
      temperature: 0.7,
      model: ModelKind::Text,
      attachments: vec![],
    }
  }

  pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
    Self { json_mode: true, ..Self::text(system, user) }
  }

  /// User-only vision request with a single attachment.
  pub fn vision(instruction: impl Into<String>, attachment: Attachment) -> Self {
    Self {
      system: None,
      user: instruction.into(),
      json_mode: false,
      temperature: 0.0,
      model: ModelKind::Vision,
      attachments: vec![attachment],
    }
  }

  pub fn with_temperature(mut self, temperature: f32) -> Self {
    self.temperature = temperature;
    self
  }
}

#[derive(Debug, Error)]
pub enum CompletionError {
  #[error("completion service not configured")]
  NotConfigured,
  #[error("completion timed out after {0}s")]
  Timeout(u64),
  #[error("completion service HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("completion service returned an empty response")]
  EmptyResponse,
  #[error("completion service returned unreadable JSON: {0}")]
  InvalidJson(String),
}

impl CompletionError {
  /// Worth another attempt: transport hiccups, rate limits, server errors.
  pub fn is_retryable(&self) -> bool {
    match self {
      CompletionError::Transport(_) | CompletionError::Timeout(_) => true,
      CompletionError::Http { status, .. } => *status == 429 || *status >= 500,
      _ => false,
    }
  }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
  /// Returns the raw assistant text, trimmed.
  async fn complete(&self, req: CompletionRequest) -> Result<String, CompletionError>;

  /// Short label for logs (provider + model).
  fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_policy() {
    assert!(CompletionError::Transport("reset".into()).is_retryable());
    assert!(CompletionError::Http { status: 429, message: String::new() }.is_retryable());
    assert!(CompletionError::Http { status: 503, message: String::new() }.is_retryable());
    assert!(!CompletionError::Http { status: 401, message: String::new() }.is_retryable());
    assert!(!CompletionError::EmptyResponse.is_retryable());
  }

  #[test]
  fn json_request_keeps_text_defaults() {
    let r = CompletionRequest::json("sys", "user").with_temperature(0.2);
    assert!(r.json_mode);
    assert_eq!(r.model, ModelKind::Text);
    assert_eq!(r.temperature, 0.2);
    assert_eq!(r.system.as_deref(), Some("sys"));
  }
}
