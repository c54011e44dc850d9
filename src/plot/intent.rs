//! Plot intent: the upstream decision whether and how a subtask can be graphed.
//!
//! `classify` is the single place where defaults are substituted. Downstream
//! code (evaluator, chart builder) can rely on a concrete domain and on the
//! graph-type/expression pairing being consistent.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_DOMAIN: Domain = Domain { x_min: -10.0, x_max: 10.0, y_min: -50.0, y_max: 50.0 };
pub const DEFAULT_SPECIAL_COLOR: &str = "#ef4444";

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
  Function,
  Polynomial,
  Line,
  Circle,
  Points,
  None,
}

impl GraphType {
  fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "function" => Some(GraphType::Function),
      "polynomial" => Some(GraphType::Polynomial),
      "line" => Some(GraphType::Line),
      "circle" => Some(GraphType::Circle),
      "points" => Some(GraphType::Points),
      "none" | "" => Some(GraphType::None),
      _ => None,
    }
  }

  /// Wire name, same as the serde form.
  pub fn as_str(self) -> &'static str {
    match self {
      GraphType::Function => "function",
      GraphType::Polynomial => "polynomial",
      GraphType::Line => "line",
      GraphType::Circle => "circle",
      GraphType::Points => "points",
      GraphType::None => "none",
    }
  }

  /// Graph types drawn by sampling an expression.
  pub fn is_sampled(self) -> bool {
    matches!(self, GraphType::Function | GraphType::Polynomial | GraphType::Line)
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
  pub x_min: f64,
  pub x_max: f64,
  pub y_min: f64,
  pub y_max: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Point {
  pub x: f64,
  pub y: f64,
  pub label: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SpecialPoint {
  pub x: f64,
  pub y: f64,
  pub label: String,
  pub color: String,
}

/// Validated intent. When `plottable` is false only `reason` is meaningful.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotIntent {
  pub plottable: bool,
  pub reason: String,
  pub graph_type: GraphType,
  pub expression: Option<String>,
  pub domain: Domain,
  pub title: Option<String>,
  pub x_label: Option<String>,
  pub y_label: Option<String>,
  pub points: Vec<Point>,
  pub special_points: Vec<SpecialPoint>,
}

impl PlotIntent {
  pub fn not_plottable(reason: impl Into<String>) -> Self {
    Self {
      plottable: false,
      reason: reason.into(),
      graph_type: GraphType::None,
      expression: None,
      domain: DEFAULT_DOMAIN,
      title: None,
      x_label: None,
      y_label: None,
      points: vec![],
      special_points: vec![],
    }
  }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
  #[error("plot decision is not valid JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),
  #[error("plot decision must be a JSON object, got {0}")]
  NotAnObject(&'static str),
}

/// Parse the raw completion text, then classify it.
pub fn classify_text(raw: &str) -> Result<PlotIntent, ClassifyError> {
  let v: Value = serde_json::from_str(raw)?;
  classify(&v)
}

pub fn classify(raw: &Value) -> Result<PlotIntent, ClassifyError> {
  let obj = raw.as_object().ok_or(ClassifyError::NotAnObject(json_kind(raw)))?;

  let reason = str_field(obj, "reason").unwrap_or_default();
  // Fail closed: no explicit `true`, no graph.
  if !obj.get("plottable").and_then(Value::as_bool).unwrap_or(false) {
    let reason = if reason.is_empty() { "No graphical representation possible for this task.".to_string() } else { reason };
    return Ok(PlotIntent::not_plottable(reason));
  }

  let type_str = str_field(obj, "graphType").unwrap_or_else(|| "function".into());
  let graph_type = match GraphType::parse(&type_str) {
    Some(GraphType::None) => return Ok(PlotIntent::not_plottable(or_default(reason, "Graph type 'none'."))),
    Some(GraphType::Circle) | None => {
      debug!(target: "plot", graph_type = %type_str, "Unsupported graph type");
      return Ok(PlotIntent::not_plottable(format!("Graph type '{}' is not supported yet.", type_str)));
    }
    Some(t) => t,
  };

  let expression = str_field(obj, "expression").or_else(|| str_field(obj, "function")).filter(|e| !e.is_empty());
  if graph_type.is_sampled() && expression.is_none() {
    return Ok(PlotIntent::not_plottable("missing expression"));
  }

  let points = parse_points(obj.get("points"));
  if graph_type == GraphType::Points && points.is_empty() {
    return Ok(PlotIntent::not_plottable("No points to plot."));
  }

  Ok(PlotIntent {
    plottable: true,
    reason,
    graph_type,
    expression,
    domain: parse_domain(obj.get("domain")),
    title: str_field(obj, "title").filter(|s| !s.is_empty()),
    x_label: str_field(obj, "xLabel").filter(|s| !s.is_empty()),
    y_label: str_field(obj, "yLabel").filter(|s| !s.is_empty()),
    points,
    special_points: parse_special_points(obj.get("specialPoints")),
  })
}

/// All four bounds or the default; also rejects inverted ranges and spans too
/// wide to step through in f64.
fn parse_domain(v: Option<&Value>) -> Domain {
  let Some(d) = v.and_then(Value::as_object) else { return DEFAULT_DOMAIN };
  let get = |k: &str| d.get(k).and_then(Value::as_f64).filter(|f| f.is_finite());
  let span = |lo: f64, hi: f64| lo < hi && (hi - lo).is_finite();
  match (get("xMin"), get("xMax"), get("yMin"), get("yMax")) {
    (Some(x_min), Some(x_max), Some(y_min), Some(y_max)) if span(x_min, x_max) && span(y_min, y_max) => {
      Domain { x_min, x_max, y_min, y_max }
    }
    _ => {
      debug!(target: "plot", domain = ?d, "Incomplete or invalid domain; using default");
      DEFAULT_DOMAIN
    }
  }
}

fn parse_points(v: Option<&Value>) -> Vec<Point> {
  coords(v)
    .map(|(i, x, y, p)| Point { x, y, label: str_field(p, "label").unwrap_or_else(|| format!("P{}", i + 1)) })
    .collect()
}

fn parse_special_points(v: Option<&Value>) -> Vec<SpecialPoint> {
  coords(v)
    .map(|(i, x, y, p)| SpecialPoint {
      x,
      y,
      label: str_field(p, "label").unwrap_or_else(|| format!("P{}", i + 1)),
      color: str_field(p, "color").filter(|c| !c.is_empty()).unwrap_or_else(|| DEFAULT_SPECIAL_COLOR.into()),
    })
    .collect()
}

/// Entries with numeric, finite x and y; everything else is skipped.
/// The index is the entry's position among the kept points.
fn coords(v: Option<&Value>) -> impl Iterator<Item = (usize, f64, f64, &Map<String, Value>)> {
  v.and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(|p| {
      let p = p.as_object()?;
      let x = p.get("x").and_then(Value::as_f64).filter(|f| f.is_finite())?;
      let y = p.get("y").and_then(Value::as_f64).filter(|f| f.is_finite())?;
      Some((x, y, p))
    })
    .enumerate()
    .map(|(i, (x, y, p))| (i, x, y, p))
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj.get(key).and_then(Value::as_str).map(|s| s.trim().to_string())
}

fn or_default(s: String, fallback: &str) -> String {
  if s.is_empty() { fallback.to_string() } else { s }
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn missing_plottable_fails_closed() {
    let intent = classify(&json!({ "graphType": "function", "function": "x" })).unwrap();
    assert!(!intent.plottable);
  }

  #[test]
  fn not_plottable_keeps_reason() {
    let intent = classify(&json!({
      "plottable": false,
      "reason": "Abstrakte Bedingung ohne konkrete Funktion",
      "graphType": "none"
    }))
    .unwrap();
    assert!(!intent.plottable);
    assert_eq!(intent.reason, "Abstrakte Bedingung ohne konkrete Funktion");
  }

  #[test]
  fn function_without_expression_downgrades() {
    let intent = classify(&json!({ "plottable": true, "graphType": "polynomial", "function": "  " })).unwrap();
    assert!(!intent.plottable);
    assert_eq!(intent.reason, "missing expression");
  }

  #[test]
  fn expression_key_is_preferred_over_function() {
    let intent = classify(&json!({ "plottable": true, "graphType": "line", "expression": "2*x", "function": "x" })).unwrap();
    assert_eq!(intent.expression.as_deref(), Some("2*x"));
  }

  #[test]
  fn partial_domain_gets_default() {
    let intent = classify(&json!({
      "plottable": true, "graphType": "function", "function": "x**2",
      "domain": { "xMin": -3, "xMax": 3 }
    }))
    .unwrap();
    assert_eq!(intent.domain, DEFAULT_DOMAIN);
    assert_eq!(intent.domain, Domain { x_min: -10.0, x_max: 10.0, y_min: -50.0, y_max: 50.0 });
  }

  #[test]
  fn complete_domain_is_kept_and_inverted_is_replaced() {
    let ok = classify(&json!({
      "plottable": true, "graphType": "function", "function": "x",
      "domain": { "xMin": -5, "xMax": 5, "yMin": -50, "yMax": 50 }
    }))
    .unwrap();
    assert_eq!(ok.domain.x_min, -5.0);
    let inverted = classify(&json!({
      "plottable": true, "graphType": "function", "function": "x",
      "domain": { "xMin": 5, "xMax": -5, "yMin": -1, "yMax": 1 }
    }))
    .unwrap();
    assert_eq!(inverted.domain, DEFAULT_DOMAIN);
  }

  #[test]
  fn overflowing_domain_width_is_replaced() {
    let huge = classify(&json!({
      "plottable": true, "graphType": "function", "function": "1",
      "domain": { "xMin": -1e308, "xMax": 1e308, "yMin": -1, "yMax": 1 }
    }))
    .unwrap();
    assert_eq!(huge.domain, DEFAULT_DOMAIN);
  }

  #[test]
  fn points_without_points_downgrade() {
    let intent = classify(&json!({ "plottable": true, "graphType": "points", "points": [] })).unwrap();
    assert!(!intent.plottable);
  }

  #[test]
  fn points_keep_order_and_labels_and_drop_invalid_entries() {
    let intent = classify(&json!({
      "plottable": true, "graphType": "points",
      "points": [ {"x": 1, "y": 2, "label": "A"}, {"x": "?", "y": 1}, {"x": 3, "y": 6} ]
    }))
    .unwrap();
    assert_eq!(intent.points.len(), 2);
    assert_eq!(intent.points[0], Point { x: 1.0, y: 2.0, label: "A".into() });
    assert_eq!(intent.points[1].label, "P2");
  }

  #[test]
  fn special_points_default_color() {
    let intent = classify(&json!({
      "plottable": true, "graphType": "polynomial", "function": "x**3 - 27",
      "specialPoints": [ {"x": 3, "y": 0, "label": "Nullstelle"} ]
    }))
    .unwrap();
    assert_eq!(intent.special_points[0].color, DEFAULT_SPECIAL_COLOR);
  }

  #[test]
  fn circle_and_unknown_types_are_not_supported() {
    for t in ["circle", "heatmap"] {
      let intent = classify(&json!({ "plottable": true, "graphType": t, "function": "x" })).unwrap();
      assert!(!intent.plottable);
      assert!(intent.reason.contains(t));
    }
  }

  #[test]
  fn non_object_payload_is_an_error() {
    assert!(matches!(classify(&json!([1, 2])), Err(ClassifyError::NotAnObject("an array"))));
    assert!(matches!(classify_text("not json"), Err(ClassifyError::InvalidJson(_))));
  }
}
