//! Application state: prompts, the optional completion service, and the session log.
//!
//! Nothing here is request-scoped; handlers share one `Arc<AppState>`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::completion::{CompletionError, CompletionService};
use crate::config::{load_agent_config_from_env, session_log_path_from_env, Prompts};
use crate::openai::OpenAI;
use crate::session_log::SessionLog;

pub struct AppState {
  pub completion: Option<Arc<dyn CompletionService>>,
  pub prompts: Prompts,
  pub session_log: SessionLog,
}

impl AppState {
  /// Build state from env: load prompt overrides, init OpenAI, open the session log path.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let prompts = load_agent_config_from_env().map(|c| c.prompts).unwrap_or_default();

    let completion: Option<Arc<dyn CompletionService>> = match OpenAI::from_env() {
      Some(oa) => {
        info!(target: "clarity_coach", service = %oa.describe(), timeout_secs = oa.timeout_secs, max_retries = oa.max_retries, "OpenAI enabled.");
        Some(Arc::new(oa))
      }
      None => {
        warn!(target: "clarity_coach", "OpenAI disabled (no OPENAI_API_KEY). Coaching endpoints will answer 500.");
        None
      }
    };

    let session_log = SessionLog::new(session_log_path_from_env());
    info!(target: "session_log", path = %session_log.path().display(), "Session log path");

    Self { completion, prompts, session_log }
  }

  /// Explicit wiring, used by tests and embedders.
  pub fn with_service(completion: Option<Arc<dyn CompletionService>>, prompts: Prompts, session_log: SessionLog) -> Self {
    Self { completion, prompts, session_log }
  }

  pub fn service(&self) -> Result<&dyn CompletionService, CompletionError> {
    self.completion.as_deref().ok_or(CompletionError::NotConfigured)
  }
}
