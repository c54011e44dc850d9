//! HTTP-facing error type. Handlers return `Result<_, AppError>`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::completion::CompletionError;
use crate::extract::ExtractError;
use crate::session_log::SessionLogError;
use crate::util::trunc_detail;

/// Client-facing detail is cut to this many characters.
pub const MAX_DETAIL_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  Upstream(String),
  #[error("{0}")]
  Internal(String),
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Wrap an upstream failure with the operation that hit it.
  pub fn upstream(op: &str, e: impl std::fmt::Display) -> Self {
    AppError::Upstream(format!("{} failed: {}", op, e))
  }
}

impl From<CompletionError> for AppError {
  fn from(e: CompletionError) -> Self {
    AppError::Upstream(e.to_string())
  }
}

impl From<ExtractError> for AppError {
  fn from(e: ExtractError) -> Self {
    match e {
      ExtractError::NoFile | ExtractError::Unsupported(_) | ExtractError::InvalidUtf8(_) | ExtractError::Multipart(_) => {
        AppError::BadRequest(e.to_string())
      }
      ExtractError::Upstream { .. } => AppError::Upstream(format!("upload/analysis failed: {}", e)),
    }
  }
}

impl From<SessionLogError> for AppError {
  fn from(e: SessionLogError) -> Self {
    match e {
      SessionLogError::Invalid(_) => AppError::BadRequest(e.to_string()),
      SessionLogError::MissingLog => AppError::NotFound(e.to_string()),
      SessionLogError::Io(_) | SessionLogError::Encode(_) => AppError::Internal(e.to_string()),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "clarity_coach", %status, error = %self, "Request failed");
    } else {
      warn!(target: "clarity_coach", %status, error = %self, "Request rejected");
    }
    let detail = trunc_detail(&self.to_string(), MAX_DETAIL_CHARS);
    (status, Json(json!({ "detail": detail }))).into_response()
  }
}
