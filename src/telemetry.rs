//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL controls the filter: a bare level ("debug") or full directives
//!   such as "info,plot=trace,coach=debug,tower_http=warn".
//! - LOG_FORMAT selects "pretty" (default), "compact" or "json".
//!
//! Targets used across the crate: `clarity_coach` (wiring, upstream calls),
//! `decompose`, `plot`, `coach` (hint/check/visualize/animate), `session_log`.
//! Tower HTTP TraceLayer adds per-request spans on top.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,clarity_coach=debug,decompose=debug,plot=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
  Pretty,
  Compact,
  Json,
}

fn log_format(v: Option<&str>) -> LogFormat {
  match v.map(|s| s.trim().to_lowercase()).as_deref() {
    Some("json") => LogFormat::Json,
    Some("compact") => LogFormat::Compact,
    _ => LogFormat::Pretty,
  }
}

pub fn init_tracing() {
  let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  // Each arm finishes its own builder; the formatter types differ.
  match log_format(std::env::var("LOG_FORMAT").ok().as_deref()) {
    LogFormat::Json => builder.json().with_current_span(true).init(),
    LogFormat::Compact => builder.compact().init(),
    LogFormat::Pretty => builder.init(),
  }
}
