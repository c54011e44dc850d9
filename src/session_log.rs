//! Append-only JSON-lines log of tutoring sessions and post-session assessments.
//!
//! One record per line, tagged with `kind`. The file is never rewritten; the
//! only read is a line count to derive the next session id.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum SessionLogError {
  #[error("invalid log entry: {0}")]
  Invalid(String),
  #[error("session log file not found")]
  MissingLog,
  #[error("session log io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("session log encode error: {0}")]
  Encode(#[from] serde_json::Error),
}

fn default_self_sufficiency() -> f64 {
  5.0
}

/// The score is range-checked in `validate`, after parsing, and logged as an integer.
fn score_as_int<S: serde::Serializer>(score: &f64, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_i64(*score as i64)
}

/// Usage summary the front end sends when a session ends.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
  #[serde(default)]
  pub user_name: String,
  #[serde(default)]
  pub class_name: String,
  #[serde(default)]
  pub school: String,
  #[serde(default)]
  pub subject: String,
  #[serde(default)]
  pub topic: String,
  #[serde(default)]
  pub task_type: String,
  #[serde(default)]
  pub difficulty: String,
  #[serde(default)]
  pub file_name: String,
  #[serde(default)]
  pub file_type: String,
  #[serde(default)]
  pub task_count: i64,
  #[serde(default)]
  pub subtask_count: i64,
  #[serde(default)]
  pub visualizations_used: i64,
  #[serde(default)]
  pub animations_used: i64,
  #[serde(default)]
  pub plots_used: i64,
  #[serde(default)]
  pub hints_used: i64,
  #[serde(default)]
  pub approach_checks_used: i64,
  /// 1 (needed constant help) to 5 (fully independent).
  #[serde(default = "default_self_sufficiency", serialize_with = "score_as_int")]
  pub self_sufficiency_score: f64,
  #[serde(default)]
  pub feedback: String,
  #[serde(default)]
  pub session_minutes: f64,
  #[serde(default)]
  pub notes: String,
}

impl SessionEntry {
  pub fn validate(&self) -> Result<(), SessionLogError> {
    let score = self.self_sufficiency_score;
    if !(1.0..=5.0).contains(&score) || score.fract() != 0.0 {
      return Err(SessionLogError::Invalid(format!(
        "selfSufficiencyScore must be a whole number between 1 and 5, got {score}"
      )));
    }
    let counters = [
      ("taskCount", self.task_count),
      ("subtaskCount", self.subtask_count),
      ("visualizationsUsed", self.visualizations_used),
      ("animationsUsed", self.animations_used),
      ("plotsUsed", self.plots_used),
      ("hintsUsed", self.hints_used),
      ("approachChecksUsed", self.approach_checks_used),
    ];
    if let Some((name, _)) = counters.iter().find(|(_, n)| *n < 0) {
      return Err(SessionLogError::Invalid(format!("{name} must not be negative")));
    }
    if !self.session_minutes.is_finite() || self.session_minutes < 0.0 {
      return Err(SessionLogError::Invalid("sessionMinutes must be a non-negative number".into()));
    }
    Ok(())
  }
}

fn not_specified() -> String {
  "not specified".into()
}

/// Tutor/evaluator ratings recorded after a session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
  #[serde(default)]
  pub session_id: String,
  #[serde(default = "not_specified")]
  pub assessor_name: String,
  #[serde(default)]
  pub ai_question_quality: f64,
  #[serde(default)]
  pub engagement_level: f64,
  #[serde(default)]
  pub understanding_progress: f64,
  #[serde(default)]
  pub efficiency_score: f64,
  #[serde(default = "not_specified")]
  pub learner_type_indicator: String,
  #[serde(default)]
  pub question_loops: u32,
  #[serde(default)]
  pub remarks: String,
  #[serde(default)]
  pub further_considerations: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamp {
  date: String,
  time: String,
}

impl Stamp {
  fn of(now: &DateTime<Local>) -> Self {
    Self { date: now.format("%Y-%m-%d").to_string(), time: now.format("%H:%M:%S").to_string() }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord<'a> {
  kind: &'static str,
  session_id: &'a str,
  #[serde(flatten)]
  stamp: Stamp,
  #[serde(flatten)]
  entry: &'a SessionEntry,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentRecord<'a> {
  kind: &'static str,
  #[serde(flatten)]
  stamp: Stamp,
  #[serde(flatten)]
  assessment: &'a Assessment,
  completion_status: &'static str,
}

/// What the caller gets back after a successful append.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogReceipt {
  pub success: bool,
  pub session_id: String,
  pub message: String,
  /// 1-based line number of the new record.
  pub row: usize,
}

pub struct SessionLog {
  path: PathBuf,
  // Serializes count-then-append so two requests never mint the same id.
  lock: Mutex<()>,
}

impl SessionLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), lock: Mutex::new(()) }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  #[instrument(level = "info", skip(self, entry), fields(path = %self.path.display()))]
  pub async fn append_session(&self, entry: &SessionEntry, now: DateTime<Local>) -> Result<LogReceipt, SessionLogError> {
    entry.validate()?;
    let _guard = self.lock.lock().await;

    let (lines, sessions) = self.count().await?;
    let session_id = format!("{}-{:03}", now.format("%Y%m%d"), sessions + 1);
    let record = SessionRecord { kind: "session", session_id: &session_id, stamp: Stamp::of(&now), entry };
    self.append(&record).await?;

    info!(target: "session_log", %session_id, row = lines + 1, "Session logged");
    Ok(LogReceipt { success: true, session_id, message: "Session logged successfully".into(), row: lines + 1 })
  }

  #[instrument(level = "info", skip(self, assessment), fields(path = %self.path.display(), session_id = %assessment.session_id))]
  pub async fn append_assessment(&self, assessment: &Assessment, now: DateTime<Local>) -> Result<LogReceipt, SessionLogError> {
    let _guard = self.lock.lock().await;
    if !tokio::fs::try_exists(&self.path).await? {
      return Err(SessionLogError::MissingLog);
    }

    let (lines, _) = self.count().await?;
    let record = AssessmentRecord { kind: "assessment", stamp: Stamp::of(&now), assessment, completion_status: "complete" };
    self.append(&record).await?;

    let session_id = if assessment.session_id.is_empty() { "unknown".to_string() } else { assessment.session_id.clone() };
    info!(target: "session_log", %session_id, row = lines + 1, "Assessment logged");
    Ok(LogReceipt { success: true, session_id, message: "Assessment logged successfully".into(), row: lines + 1 })
  }

  /// (non-empty lines, session records). A missing file counts as empty.
  async fn count(&self) -> Result<(usize, usize), SessionLogError> {
    let text = match tokio::fs::read_to_string(&self.path).await {
      Ok(t) => t,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((0, 0)),
      Err(e) => return Err(e.into()),
    };
    let mut lines = 0;
    let mut sessions = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
      lines += 1;
      let is_session = serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("kind").and_then(Value::as_str).map(|k| k == "session"))
        .unwrap_or(false);
      if is_session {
        sessions += 1;
      }
    }
    Ok((lines, sessions))
  }

  async fn append<T: Serialize>(&self, record: &T) -> Result<(), SessionLogError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(dir).await?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(&self.path).await?;
    f.write_all(line.as_bytes()).await?;
    f.flush().await?;
    Ok(())
  }
}
