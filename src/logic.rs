//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Decomposing assignment text (typed or uploaded) into tasks
//!   - Leveled hints and approach checks for one subtask
//!   - Concept overviews, animation scripts and plots
//!   - The health probe
//!
//! Every function takes the shared state and returns typed results; the
//! handlers only translate them to HTTP.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::animation::{self, AnimationScript};
use crate::completion::CompletionRequest;
use crate::decompose;
use crate::domain::{ApproachCheck, Hint, HintLevel};
use crate::error::AppError;
use crate::extract::{self, UploadedFile};
use crate::plot::{self, PlotOutcome};
use crate::protocol::{CheckIn, DecomposeOut, HealthOut, HintIn, SubtaskContext};
use crate::state::AppState;
use crate::util::{fill_template, is_blank, trunc_for_log};

const DEFAULT_HINT: &str = "Think about the basics first.";
const DEFAULT_ENCOURAGEMENT: &str = "You can do it!";
const DEFAULT_ASSESSMENT: &str = "Review complete.";
const DEFAULT_NEXT_STEP: &str = "Keep working on your approach.";
const DEFAULT_CONFIDENCE: u8 = 3;

#[instrument(level = "info", skip(state))]
pub async fn health(state: &AppState) -> HealthOut {
  let Ok(service) = state.service() else {
    return HealthOut { status: "error", message: "OpenAI API key not found".into(), api_key_valid: false };
  };
  let probe = CompletionRequest::text("Reply with OK.", "test").with_temperature(0.0);
  match service.complete(probe).await {
    Ok(_) => HealthOut { status: "ok", message: "Backend and OpenAI API working".into(), api_key_valid: true },
    Err(e) => {
      warn!(target: "clarity_coach", error = %e, "Health probe failed");
      HealthOut { status: "error", message: format!("OpenAI API error: {}", e), api_key_valid: false }
    }
  }
}

/// Typed-in assignment text -> task tree (or the unparsed payload).
#[instrument(level = "info", skip(state, text), fields(text_len = text.map(str::len).unwrap_or(0)))]
pub async fn decompose_text(state: &AppState, text: Option<&str>) -> Result<DecomposeOut, AppError> {
  if is_blank(text) {
    return Err(AppError::BadRequest("no task text provided".into()));
  }
  run_decomposition(state, text.unwrap_or_default()).await
}

/// Uploaded files -> extracted text -> task tree.
#[instrument(level = "info", skip(state, files), fields(files = files.len()))]
pub async fn decompose_upload(state: &AppState, files: &[UploadedFile]) -> Result<DecomposeOut, AppError> {
  let service = state.service()?;
  let text = extract::extract_text(service, &state.prompts, files).await?;
  if text.trim().is_empty() {
    return Err(AppError::BadRequest("no task text could be extracted from the upload".into()));
  }
  run_decomposition(state, &text).await
}

async fn run_decomposition(state: &AppState, text: &str) -> Result<DecomposeOut, AppError> {
  let user = fill_template(&state.prompts.decompose_user_template, &[("text", text)]);
  let req = CompletionRequest::json(state.prompts.decompose_system.clone(), user);
  let raw = state.service()?.complete(req).await.map_err(|e| AppError::upstream("task analysis", e))?;
  debug!(target: "decompose", raw = %trunc_for_log(&raw, 400), "Decomposition raw output");

  match decompose::normalize_text(&raw) {
    Ok(tasks) => {
      let subtasks: usize = tasks.iter().map(|t| t.subtasks.len()).sum();
      info!(target: "decompose", tasks = tasks.len(), subtasks, "Decomposition ready");
      Ok(DecomposeOut::Tasks(tasks))
    }
    Err(e) => {
      warn!(target: "decompose", kind = ?e.kind, "Decomposition could not be parsed");
      Ok(DecomposeOut::Unparsed { error: e.message().to_string(), raw_output: e.raw })
    }
  }
}

/// Reject before any upstream call when the subtask text is missing.
pub fn require_subtask(ctx: &SubtaskContext) -> Result<(), AppError> {
  if ctx.subtask_text.trim().is_empty() {
    return Err(AppError::BadRequest("no subtask provided".into()));
  }
  Ok(())
}

#[instrument(level = "info", skip(state, body), fields(task = %body.ctx.task_number, sub = %body.ctx.sub_label))]
pub async fn hint(state: &AppState, body: &HintIn) -> Result<Hint, AppError> {
  require_subtask(&body.ctx)?;
  let level = HintLevel::from_number(body.level_number().unwrap_or(1));
  let p = &state.prompts;
  let strategy = match level {
    HintLevel::Socratic => &p.hint_level_1,
    HintLevel::Directive => &p.hint_level_2,
    HintLevel::Specific => &p.hint_level_3,
  };
  let previous = body
    .previous_hints
    .as_ref()
    .and_then(|h| h.joined())
    .map(|h| format!("Previous hints (do not repeat them):\n{}", h))
    .unwrap_or_default();

  let mut vars = body.ctx.template_vars().to_vec();
  vars.push(("strategy", strategy.as_str()));
  vars.push(("previous_hints", previous.as_str()));
  let req = CompletionRequest::json(p.hint_system.clone(), fill_template(&p.hint_user_template, &vars));
  let v = complete_json(state, req, "hint generation").await?;

  info!(target: "coach", level = level.as_number(), "Hint generated");
  Ok(Hint {
    hint: str_or(&v, "hint", DEFAULT_HINT),
    encouragement: str_or(&v, "encouragement", DEFAULT_ENCOURAGEMENT),
    level,
  })
}

#[instrument(level = "info", skip(state, body), fields(task = %body.ctx.task_number, sub = %body.ctx.sub_label))]
pub async fn check_approach(state: &AppState, body: &CheckIn) -> Result<ApproachCheck, AppError> {
  require_subtask(&body.ctx)?;
  if is_blank(body.student_work.as_deref()) {
    return Err(AppError::BadRequest("no student work provided".into()));
  }
  let p = &state.prompts;
  let mut vars = body.ctx.template_vars().to_vec();
  vars.push(("student_work", body.student_work.as_deref().unwrap_or_default()));
  let req = CompletionRequest::json(p.check_system.clone(), fill_template(&p.check_user_template, &vars));
  let v = complete_json(state, req, "approach check").await?;

  let check = approach_from_value(&v);
  info!(target: "coach", on_track = check.is_on_right_track, score = check.confidence_score, "Approach checked");
  Ok(check)
}

fn approach_from_value(v: &Value) -> ApproachCheck {
  let confidence_score = v
    .get("confidenceScore")
    .and_then(|s| s.as_f64().or_else(|| s.as_str().and_then(|t| t.trim().parse().ok())))
    .filter(|f| f.is_finite())
    .map(|f| f.round().clamp(1.0, 5.0) as u8)
    .unwrap_or(DEFAULT_CONFIDENCE);

  ApproachCheck {
    is_on_right_track: v.get("isOnRightTrack").and_then(Value::as_bool).unwrap_or(false),
    overall_assessment: str_or(v, "overallAssessment", DEFAULT_ASSESSMENT),
    strengths: str_list(v.get("strengths")),
    improvements: str_list(v.get("improvements")),
    specific_issue: v
      .get("specificIssue")
      .and_then(Value::as_str)
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty()),
    next_step: str_or(v, "nextStep", DEFAULT_NEXT_STEP),
    encouragement: str_or(v, "encouragement", DEFAULT_ENCOURAGEMENT),
    confidence_score,
  }
}

#[instrument(level = "info", skip(state, ctx), fields(task = %ctx.task_number, sub = %ctx.sub_label))]
pub async fn visualize(state: &AppState, ctx: &SubtaskContext) -> Result<String, AppError> {
  require_subtask(ctx)?;
  let p = &state.prompts;
  let req = CompletionRequest::text(p.visualize_system.clone(), fill_template(&p.visualize_user_template, &ctx.template_vars()));
  let text = state.service()?.complete(req).await.map_err(|e| AppError::upstream("visualization generation", e))?;
  info!(target: "coach", chars = text.chars().count(), "Visualization generated");
  Ok(text)
}

#[instrument(level = "info", skip(state, ctx), fields(task = %ctx.task_number, sub = %ctx.sub_label))]
pub async fn animate(state: &AppState, ctx: &SubtaskContext) -> Result<AnimationScript, AppError> {
  require_subtask(ctx)?;
  let p = &state.prompts;
  let req = CompletionRequest::json(p.animate_system.clone(), fill_template(&p.animate_user_template, &ctx.template_vars()));
  let v = complete_json(state, req, "animation generation").await?;
  let script = animation::normalize(&v);
  info!(target: "coach", steps = script.steps.len(), "Animation script generated");
  Ok(script)
}

#[instrument(level = "info", skip(state, ctx), fields(task = %ctx.task_number, sub = %ctx.sub_label))]
pub async fn plot(state: &AppState, ctx: &SubtaskContext) -> Result<PlotOutcome, AppError> {
  require_subtask(ctx)?;
  let p = &state.prompts;
  let req = CompletionRequest::json(p.plot_system.clone(), fill_template(&p.plot_user_template, &ctx.template_vars()));
  let raw = state.service()?.complete(req).await.map_err(|e| AppError::upstream("plot generation", e))?;
  debug!(target: "plot", raw = %trunc_for_log(&raw, 300), "Plot decision received");
  plot::render_text(&raw).map_err(|e| AppError::upstream("plot generation", e))
}

async fn complete_json(state: &AppState, req: CompletionRequest, op: &str) -> Result<Value, AppError> {
  let raw = state.service()?.complete(req).await.map_err(|e| AppError::upstream(op, e))?;
  serde_json::from_str(&raw).map_err(|e| {
    warn!(target: "coach", %op, raw = %trunc_for_log(&raw, 200), "Completion is not JSON");
    AppError::upstream(op, format!("invalid JSON: {}", e))
  })
}

fn str_or(v: &Value, key: &str, fallback: &str) -> String {
  v.get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .unwrap_or(fallback)
    .to_string()
}

fn str_list(v: Option<&Value>) -> Vec<String> {
  match v {
    Some(Value::Array(items)) => items
      .iter()
      .filter_map(Value::as_str)
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect(),
    Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
    _ => vec![],
  }
}
