//! Clarity Coach · Socratic math tutoring backend
//!
//! - Axum HTTP API under /api/v1 (decompose, hints, approach checks, plots, ...)
//! - Optional OpenAI integration (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (a `.env` file is honoured):
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables the completion service if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : default "gpt-4o-mini"
//!   OPENAI_VISION_MODEL : default "gpt-4o-mini"
//!   OPENAI_TIMEOUT_SECS : default 60
//!   OPENAI_MAX_RETRIES  : default 2
//!   AGENT_CONFIG_PATH   : path to TOML config (prompt overrides)
//!   SESSION_LOG_PATH    : default "./clarity_sessions.jsonl"
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default), "compact" or "json"

mod animation;
mod completion;
mod config;
mod decompose;
mod domain;
mod error;
mod extract;
mod logic;
mod openai;
mod plot;
mod protocol;
mod routes;
mod session_log;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Missing .env is normal in production; only a broken one is worth noting.
  let dotenv = dotenvy::dotenv();
  telemetry::init_tracing();
  if let Err(e) = &dotenv {
    if !e.not_found() {
      warn!(target: "clarity_coach", error = %e, "Ignoring unreadable .env file");
    }
  }

  // Shared application state (prompts, completion service, session log).
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "clarity_coach", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "clarity_coach", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "clarity_coach", error = %e, "Could not listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "clarity_coach", "Shutdown signal received");
}
