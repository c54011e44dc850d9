//! Router assembly: the `/api/v1` coaching API, static frontend, CORS, HTTP tracing.

use std::sync::Arc;

use axum::{
  extract::DefaultBodyLimit,
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Uploads are whole assignment sheets (multi-page PDFs, phone photos).
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

const STATIC_DIR: &str = "./static";

fn api_routes() -> Router<Arc<AppState>> {
  Router::new()
    .route("/health", get(http::http_health))
    .route("/clarity", post(http::http_post_clarity))
    .route("/upload", post(http::http_post_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
    .route("/hint", post(http::http_post_hint))
    .route("/check-approach", post(http::http_post_check_approach))
    .route("/visualize", post(http::http_post_visualize))
    .route("/animate", post(http::http_post_animate))
    .route("/plot", post(http::http_post_plot))
    .route("/log-session", post(http::http_post_log_session))
    .route("/log-assessment", post(http::http_post_log_assessment))
}

/// Full application: API under `/api/v1`, anything else falls through to the
/// SPA in `./static` (index.html for unknown paths). CORS is wide open; the
/// frontend may be served from a different origin during development.
pub fn build_router(state: Arc<AppState>) -> Router {
  let frontend = ServeDir::new(STATIC_DIR)
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new(format!("{STATIC_DIR}/index.html")));

  let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

  let trace = TraceLayer::new_for_http()
    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
    .on_request(DefaultOnRequest::new().level(Level::DEBUG))
    .on_response(DefaultOnResponse::new().level(Level::INFO));

  Router::new()
    .nest("/api/v1", api_routes())
    .with_state(state)
    .layer(cors)
    .layer(trace)
    .fallback_service(frontend)
}
