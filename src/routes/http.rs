//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Multipart, State},
  response::IntoResponse,
  Json,
};
use chrono::Local;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::extract;
use crate::logic;
use crate::plot::PlotOutcome;
use crate::protocol::*;
use crate::session_log::{Assessment, LogReceipt, SessionEntry};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::health(&state).await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_clarity(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ClarityIn>,
) -> Result<Json<DecomposeOut>, AppError> {
  let out = logic::decompose_text(&state, body.task.as_deref()).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  multipart: Multipart,
) -> Result<Json<DecomposeOut>, AppError> {
  let files = extract::read_files(multipart).await?;
  info!(target: "clarity_coach", files = files.len(), names = ?files.iter().map(|f| f.filename.as_str()).collect::<Vec<_>>(), "HTTP upload received");
  let out = logic::decompose_upload(&state, &files).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(level = ?body.level_number()))]
pub async fn http_post_hint(
  State(state): State<Arc<AppState>>,
  Json(body): Json<HintIn>,
) -> Result<Json<HintOut>, AppError> {
  let hint = logic::hint(&state, &body).await?;
  Ok(Json(HintOut { hint, success: true }))
}

#[instrument(level = "info", skip(state, body), fields(work_len = body.student_work.as_deref().map(str::len).unwrap_or(0)))]
pub async fn http_post_check_approach(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, AppError> {
  let check = logic::check_approach(&state, &body).await?;
  Ok(Json(CheckOut { check, success: true }))
}

#[instrument(level = "info", skip(state, ctx))]
pub async fn http_post_visualize(
  State(state): State<Arc<AppState>>,
  Json(ctx): Json<SubtaskContext>,
) -> Result<Json<VisualizeOut>, AppError> {
  let visualization = logic::visualize(&state, &ctx).await?;
  Ok(Json(VisualizeOut { visualization }))
}

#[instrument(level = "info", skip(state, ctx))]
pub async fn http_post_animate(
  State(state): State<Arc<AppState>>,
  Json(ctx): Json<SubtaskContext>,
) -> Result<Json<AnimateOut>, AppError> {
  let animation_data = logic::animate(&state, &ctx).await?;
  Ok(Json(AnimateOut { animation_data, success: true }))
}

#[instrument(level = "info", skip(state, ctx))]
pub async fn http_post_plot(
  State(state): State<Arc<AppState>>,
  Json(ctx): Json<SubtaskContext>,
) -> Result<Json<PlotOutcome>, AppError> {
  let out = logic::plot(&state, &ctx).await?;
  info!(target: "plot", plottable = out.plottable, "HTTP plot served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, entry))]
pub async fn http_post_log_session(
  State(state): State<Arc<AppState>>,
  Json(entry): Json<SessionEntry>,
) -> Result<Json<LogReceipt>, AppError> {
  let receipt = state.session_log.append_session(&entry, Local::now()).await?;
  Ok(Json(receipt))
}

#[instrument(level = "info", skip(state, assessment))]
pub async fn http_post_log_assessment(
  State(state): State<Arc<AppState>>,
  Json(assessment): Json<Assessment>,
) -> Result<Json<LogReceipt>, AppError> {
  let receipt = state.session_log.append_assessment(&assessment, Local::now()).await?;
  Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;
  use axum::body::Body;
  use axum::http::{Request, StatusCode};
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use crate::completion::{CompletionError, CompletionRequest, CompletionService};
  use crate::config::Prompts;
  use crate::plot::ABSTRACT_MESSAGE;
  use crate::routes::build_router;
  use crate::session_log::SessionLog;
  use crate::state::AppState;

  /// Answers from a queue and remembers every request it saw.
  #[derive(Default)]
  struct Scripted {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
  }

  impl Scripted {
    fn with(replies: &[&str]) -> Arc<Self> {
      Arc::new(Self { replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()), ..Default::default() })
    }

    fn seen(&self) -> Vec<CompletionRequest> {
      self.seen.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl CompletionService for Scripted {
    async fn complete(&self, req: CompletionRequest) -> Result<String, CompletionError> {
      self.seen.lock().unwrap().push(req);
      self.replies.lock().unwrap().pop_front().unwrap_or(Err(CompletionError::EmptyResponse))
    }

    fn describe(&self) -> String {
      "scripted".into()
    }
  }

  static LOGS: AtomicUsize = AtomicUsize::new(0);

  fn temp_log() -> SessionLog {
    let n = LOGS.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("clarity-http-log-{}-{}.jsonl", std::process::id(), n));
    let _ = std::fs::remove_file(&path);
    SessionLog::new(path)
  }

  fn app(service: Option<Arc<Scripted>>) -> axum::Router {
    let service = service.map(|s| s as Arc<dyn CompletionService>);
    build_router(Arc::new(AppState::with_service(service, Prompts::default(), temp_log())))
  }

  async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    send(app, req).await
  }

  async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  fn subtask() -> Value {
    json!({ "taskNumber": 1, "taskText": "Löse die Gleichung.", "topic": "Kubische Gleichungen", "subLabel": "a", "subtaskText": "x^3 - 27 = 0" })
  }

  #[tokio::test]
  async fn health_without_service() {
    let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
    let (status, v) = send(app(None), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "error");
    assert_eq!(v["apiKeyValid"], false);
  }

  #[tokio::test]
  async fn health_with_service() {
    let svc = Scripted::with(&["OK"]);
    let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
    let (_, v) = send(app(Some(svc)), req).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["apiKeyValid"], true);
  }

  #[tokio::test]
  async fn clarity_rejects_blank_text() {
    let svc = Scripted::with(&[]);
    let (status, v) = post(app(Some(svc.clone())), "/api/v1/clarity", json!({ "task": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["detail"], "no task text provided");
    assert!(svc.seen().is_empty());
  }

  #[tokio::test]
  async fn clarity_returns_the_task_list() {
    let svc = Scripted::with(&[r#"{"tasks":[{"number":1,"topic":"Kubische Gleichungen","difficulty":"mittel","task":"Löse.","subtasks":[{"label":"a","task":"x^3 - 27 = 0","questions":["Welche Zahl hoch 3 ergibt 27?","Wie isolierst du x^3?","Welche Umkehrfunktion brauchst du?"]}]}]}"#]);
    let (status, v) = post(app(Some(svc.clone())), "/api/v1/clarity", json!({ "task": "1. Löse x^3 - 27 = 0" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v[0]["number"], "1");
    assert_eq!(v[0]["difficulty"], "medium");
    assert_eq!(v[0]["subtasks"][0]["questions"].as_array().unwrap().len(), 3);
    let seen = svc.seen();
    assert!(seen[0].json_mode);
    assert!(seen[0].user.contains("1. Löse x^3 - 27 = 0"));
  }

  #[tokio::test]
  async fn clarity_surfaces_unparsed_output() {
    let svc = Scripted::with(&["Here are your tasks: 1) ..."]);
    let (status, v) = post(app(Some(svc)), "/api/v1/clarity", json!({ "task": "1. x" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["error"].is_string());
    assert_eq!(v["rawOutput"], "Here are your tasks: 1) ...");
  }

  #[tokio::test]
  async fn hint_without_subtask_makes_no_upstream_call() {
    let svc = Scripted::with(&[]);
    let (status, v) = post(app(Some(svc.clone())), "/api/v1/hint", json!({ "taskNumber": "1", "hintLevel": 2 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["detail"], "no subtask provided");
    assert!(svc.seen().is_empty());
  }

  #[tokio::test]
  async fn malformed_subtask_text_is_a_bad_request_everywhere() {
    let svc = Scripted::with(&[]);
    for uri in ["/api/v1/hint", "/api/v1/check-approach", "/api/v1/visualize", "/api/v1/animate", "/api/v1/plot"] {
      for bad in [Value::Null, json!(5), json!(["x"])] {
        let body = json!({ "taskNumber": 1, "subtaskText": bad, "studentWork": "x = 3" });
        let (status, v) = post(app(Some(svc.clone())), uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(v["detail"], "no subtask provided", "{uri}");
      }
    }
    assert!(svc.seen().is_empty());
  }

  #[tokio::test]
  async fn hint_uses_the_requested_level() {
    let svc = Scripted::with(&[r#"{"hint":"Bringe -27 auf die andere Seite."}"#]);
    let mut body = subtask();
    body["hintLevel"] = json!(2);
    body["previousHints"] = json!("Welche Zahl hoch 3 ergibt 27?");
    let (status, v) = post(app(Some(svc.clone())), "/api/v1/hint", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["level"], 2);
    assert_eq!(v["hint"], "Bringe -27 auf die andere Seite.");
    assert_eq!(v["encouragement"], "You can do it!");
    assert_eq!(v["success"], true);
    let user = &svc.seen()[0].user;
    assert!(user.contains(&Prompts::default().hint_level_2));
    assert!(user.contains("Welche Zahl hoch 3 ergibt 27?"));
    assert!(user.contains("x^3 - 27 = 0"));
  }

  #[tokio::test]
  async fn hint_level_out_of_range_falls_back_to_one() {
    let svc = Scripted::with(&["{}"]);
    let mut body = subtask();
    body["hintLevel"] = json!(9);
    let (_, v) = post(app(Some(svc)), "/api/v1/hint", body).await;
    assert_eq!(v["level"], 1);
    assert_eq!(v["hint"], "Think about the basics first.");
  }

  #[tokio::test]
  async fn check_requires_student_work() {
    let svc = Scripted::with(&[]);
    let (status, v) = post(app(Some(svc)), "/api/v1/check-approach", subtask()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["detail"], "no student work provided");
  }

  #[tokio::test]
  async fn check_fills_defaults() {
    let svc = Scripted::with(&[r#"{"isOnRightTrack":true,"strengths":["Richtige Idee"],"confidenceScore":12}"#]);
    let mut body = subtask();
    body["studentWork"] = json!("x^3 = 27, also x = 3");
    let (status, v) = post(app(Some(svc)), "/api/v1/check-approach", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isOnRightTrack"], true);
    assert_eq!(v["confidenceScore"], 5);
    assert_eq!(v["nextStep"], "Keep working on your approach.");
    assert_eq!(v["specificIssue"], Value::Null);
    assert_eq!(v["success"], true);
  }

  #[tokio::test]
  async fn visualize_without_service_is_a_server_error() {
    let (status, v) = post(app(None), "/api/v1/visualize", subtask()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["detail"], "completion service not configured");
  }

  #[tokio::test]
  async fn visualize_returns_text() {
    let svc = Scripted::with(&["**Core concepts**\n- Roots"]);
    let (status, v) = post(app(Some(svc.clone())), "/api/v1/visualize", subtask()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["visualization"], "**Core concepts**\n- Roots");
    assert!(!svc.seen()[0].json_mode);
  }

  #[tokio::test]
  async fn animate_normalizes_and_rejects_garbage() {
    let svc = Scripted::with(&[r#"{"title":"x^3 = 27","steps":[{"description":"Start","latex":"x^3 - 27 = 0","animation":"zoom"}]}"#, "not json"]);
    let router = app(Some(svc));
    let (status, v) = post(router.clone(), "/api/v1/animate", subtask()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["animationData"]["steps"][0]["animation"], "fadeIn");
    assert_eq!(v["animationData"]["steps"][0]["id"], 1);
    let (status, _) = post(router, "/api/v1/animate", subtask()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn plot_concrete_function() {
    let svc = Scripted::with(&[r#"{"plottable":true,"reason":"Nullstelle","graphType":"polynomial","function":"x**3 - 27","domain":{"xMin":-5,"xMax":5,"yMin":-50,"yMax":50},"title":"f(x) = x³ - 27","specialPoints":[{"x":3,"y":0,"label":"Nullstelle x=3","color":"red"}]}"#]);
    let (status, v) = post(app(Some(svc)), "/api/v1/plot", subtask()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["plottable"], true);
    assert_eq!(v["graphType"], "polynomial");
    assert_eq!(v["chartType"], "chartjs");
    assert_eq!(v["chartSpec"]["series"][0]["points"].as_array().unwrap().len(), 100);
    assert_eq!(v["plotData"]["type"], "scatter");
  }

  #[tokio::test]
  async fn plot_abstract_expression() {
    let svc = Scripted::with(&[r#"{"plottable":true,"graphType":"line","function":"a*x + b"}"#]);
    let (status, v) = post(app(Some(svc)), "/api/v1/plot", subtask()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!({ "plottable": false, "message": ABSTRACT_MESSAGE }));
  }

  #[tokio::test]
  async fn plot_non_json_decision_is_a_server_error() {
    let svc = Scripted::with(&["I think a graph would help."]);
    let (status, _) = post(app(Some(svc)), "/api/v1/plot", subtask()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn upload_text_file_is_decomposed() {
    let svc = Scripted::with(&[r#"{"tasks":[{"number":"1","task":"Löse x^3 - 27 = 0","subtasks":[]}]}"#]);
    let body = "--XYZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"blatt.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
1. Löse x^3 - 27 = 0\r\n\
--XYZ--\r\n";
    let req = Request::builder()
      .method("POST")
      .uri("/api/v1/upload")
      .header("content-type", "multipart/form-data; boundary=XYZ")
      .body(Body::from(body))
      .unwrap();
    let (status, v) = send(app(Some(svc.clone())), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v[0]["task"], "Löse x^3 - 27 = 0");
    let seen = svc.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].user.contains("1. Löse x^3 - 27 = 0"));
  }

  #[tokio::test]
  async fn upload_rejects_unsupported_types() {
    let svc = Scripted::with(&[]);
    let body = "--XYZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"blatt.docx\"\r\n\r\n\
PK\r\n\
--XYZ--\r\n";
    let req = Request::builder()
      .method("POST")
      .uri("/api/v1/upload")
      .header("content-type", "multipart/form-data; boundary=XYZ")
      .body(Body::from(body))
      .unwrap();
    let (status, v) = send(app(Some(svc.clone())), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["detail"].as_str().unwrap().contains("blatt.docx"));
    assert!(svc.seen().is_empty());
  }

  #[tokio::test]
  async fn session_then_assessment() {
    let router = app(None);
    let (status, _) = post(router.clone(), "/api/v1/log-assessment", json!({ "sessionId": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, v) = post(router.clone(), "/api/v1/log-session", json!({ "userName": "Mia", "hintsUsed": 3 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert!(v["sessionId"].as_str().unwrap().ends_with("-001"));
    assert_eq!(v["row"], 1);

    let (status, v) = post(router.clone(), "/api/v1/log-assessment", json!({ "sessionId": v["sessionId"], "engagementLevel": 4 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["row"], 2);

    let (status, v) = post(router, "/api/v1/log-session", json!({ "selfSufficiencyScore": 7 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["detail"].as_str().unwrap().contains("selfSufficiencyScore"));
  }

  #[tokio::test]
  async fn session_numbers_outside_any_range_are_bad_requests() {
    for body in [json!({ "selfSufficiencyScore": 300 }), json!({ "selfSufficiencyScore": -1 }), json!({ "plotsUsed": -2 })] {
      let (status, v) = post(app(None), "/api/v1/log-session", body.clone()).await;
      assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
      assert!(v["detail"].is_string(), "{body}");
    }
  }
}
