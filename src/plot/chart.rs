//! Renderer-agnostic chart description assembled from a plot intent and samples.
//!
//! No numeric work happens here. Everything the front end needs (series,
//! axes, labels, colors) is spelled out so the consumer never evaluates
//! anything itself.

use serde::Serialize;

use super::intent::{GraphType, PlotIntent};

pub const CURVE_COLOR: &str = "#2c5f8d";
pub const SPECIAL_COLOR: &str = "#ef4444";
pub const GIVEN_COLOR: &str = "#10b981";
const MARKER_RADIUS: f64 = 8.0;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesRole {
  SampledCurve,
  GivenPoints,
  SpecialPoints,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChartPoint {
  pub x: f64,
  pub y: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
}

impl ChartPoint {
  fn bare(x: f64, y: f64) -> Self {
    Self { x, y, label: None, color: None }
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Series {
  pub role: SeriesRole,
  pub label: String,
  pub color: String,
  /// Connect points with a line (curves) or draw markers only.
  pub show_line: bool,
  /// 0 for curves, larger for markers.
  pub point_radius: f64,
  pub points: Vec<ChartPoint>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Axis {
  pub label: String,
  pub min: f64,
  pub max: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
  pub plottable: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub x_axis: Option<Axis>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub y_axis: Option<Axis>,
  pub series: Vec<Series>,
}

impl ChartSpec {
  pub fn not_plottable(reason: impl Into<String>) -> Self {
    Self { plottable: false, reason: Some(reason.into()), title: None, x_axis: None, y_axis: None, series: vec![] }
  }
}

/// Assemble the chart. `sampled` is required for curve graph types and ignored
/// for `points`.
pub fn build(intent: &PlotIntent, sampled: Option<&[(f64, f64)]>) -> ChartSpec {
  if !intent.plottable {
    return ChartSpec::not_plottable(intent.reason.clone());
  }

  let series = match intent.graph_type {
    t if t.is_sampled() => {
      let Some(sampled) = sampled else {
        return ChartSpec::not_plottable("No sample data for the expression.");
      };
      curve_series(intent, sampled)
    }
    GraphType::Points => vec![points_only_series(intent)],
    // `classify` already turns these into not-plottable intents.
    other => return ChartSpec::not_plottable(format!("Graph type '{}' cannot be drawn.", other.as_str())),
  };

  ChartSpec {
    plottable: true,
    reason: None,
    title: Some(title(intent)),
    x_axis: Some(Axis {
      label: intent.x_label.clone().unwrap_or_else(|| "x".into()),
      min: intent.domain.x_min,
      max: intent.domain.x_max,
    }),
    y_axis: Some(Axis {
      label: intent.y_label.clone().unwrap_or_else(|| "y".into()),
      min: intent.domain.y_min,
      max: intent.domain.y_max,
    }),
    series,
  }
}

fn title(intent: &PlotIntent) -> String {
  intent.title.clone().unwrap_or_else(|| "Chart".into())
}

fn curve_series(intent: &PlotIntent, sampled: &[(f64, f64)]) -> Vec<Series> {
  let mut out = vec![Series {
    role: SeriesRole::SampledCurve,
    label: intent.title.clone().or_else(|| intent.expression.clone()).unwrap_or_else(|| "f(x)".into()),
    color: CURVE_COLOR.into(),
    show_line: true,
    point_radius: 0.0,
    points: sampled.iter().map(|(x, y)| ChartPoint::bare(*x, *y)).collect(),
  }];

  if !intent.special_points.is_empty() {
    out.push(Series {
      role: SeriesRole::SpecialPoints,
      label: "Special points".into(),
      color: SPECIAL_COLOR.into(),
      show_line: false,
      point_radius: MARKER_RADIUS,
      points: intent
        .special_points
        .iter()
        .map(|p| ChartPoint { x: p.x, y: p.y, label: Some(p.label.clone()), color: Some(p.color.clone()) })
        .collect(),
    });
  }

  if !intent.points.is_empty() {
    out.push(Series {
      role: SeriesRole::GivenPoints,
      label: "Given points".into(),
      color: GIVEN_COLOR.into(),
      show_line: false,
      point_radius: MARKER_RADIUS,
      points: intent
        .points
        .iter()
        .map(|p| ChartPoint { x: p.x, y: p.y, label: Some(p.label.clone()), color: Some(GIVEN_COLOR.into()) })
        .collect(),
    });
  }
  out
}

fn points_only_series(intent: &PlotIntent) -> Series {
  Series {
    role: SeriesRole::GivenPoints,
    label: intent.title.clone().unwrap_or_else(|| "Points".into()),
    color: CURVE_COLOR.into(),
    show_line: false,
    point_radius: MARKER_RADIUS,
    points: intent
      .points
      .iter()
      .map(|p| ChartPoint { x: p.x, y: p.y, label: Some(p.label.clone()), color: None })
      .collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::plot::intent::{classify, Point, SpecialPoint, DEFAULT_DOMAIN};
  use serde_json::json;

  fn curve_intent() -> PlotIntent {
    PlotIntent {
      plottable: true,
      reason: "Nullstelle sichtbar".into(),
      graph_type: GraphType::Polynomial,
      expression: Some("x**3 - 27".into()),
      domain: DEFAULT_DOMAIN,
      title: Some("f(x) = x³ - 27".into()),
      x_label: None,
      y_label: Some("f(x)".into()),
      points: vec![],
      special_points: vec![],
    }
  }

  #[test]
  fn undrawable_type_names_itself() {
    let mut intent = curve_intent();
    intent.graph_type = GraphType::Circle;
    let spec = build(&intent, None);
    assert!(!spec.plottable);
    assert_eq!(spec.reason.as_deref(), Some("Graph type 'circle' cannot be drawn."));
    for t in [GraphType::Function, GraphType::Points, GraphType::None] {
      assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
    }
  }

  #[test]
  fn not_plottable_has_no_series_and_keeps_reason() {
    let intent = PlotIntent::not_plottable("Einfache Arithmetik ohne grafische Komponente");
    let spec = build(&intent, None);
    assert!(!spec.plottable);
    assert!(spec.series.is_empty());
    assert_eq!(spec.reason.as_deref(), Some("Einfache Arithmetik ohne grafische Komponente"));
  }

  #[test]
  fn curve_only_when_no_extra_points() {
    let spec = build(&curve_intent(), Some(&[(0.0, -27.0), (3.0, 0.0)][..]));
    assert_eq!(spec.series.len(), 1);
    assert_eq!(spec.series[0].role, SeriesRole::SampledCurve);
    assert_eq!(spec.series[0].points.len(), 2);
    assert_eq!(spec.x_axis.as_ref().unwrap().label, "x");
    assert_eq!(spec.y_axis.as_ref().unwrap().label, "f(x)");
    assert_eq!(spec.y_axis.as_ref().unwrap().min, -50.0);
  }

  #[test]
  fn special_and_given_points_are_additive() {
    let mut intent = curve_intent();
    intent.special_points = vec![SpecialPoint { x: 3.0, y: 0.0, label: "Nullstelle x=3".into(), color: "red".into() }];
    intent.points = vec![Point { x: 1.0, y: -26.0, label: "A".into() }];
    let spec = build(&intent, Some(&[(0.0, -27.0)][..]));
    let roles: Vec<SeriesRole> = spec.series.iter().map(|s| s.role).collect();
    assert_eq!(roles, [SeriesRole::SampledCurve, SeriesRole::SpecialPoints, SeriesRole::GivenPoints]);
    assert_eq!(spec.series[1].points[0].color.as_deref(), Some("red"));
    assert_eq!(spec.series[2].color, GIVEN_COLOR);
  }

  #[test]
  fn points_graph_is_a_single_marker_series() {
    let intent = classify(&json!({
      "plottable": true, "graphType": "points",
      "points": [ {"x": 1, "y": 2, "label": "A"}, {"x": 3, "y": 6, "label": "B"} ]
    }))
    .unwrap();
    let spec = build(&intent, None);
    assert_eq!(spec.series.len(), 1);
    let s = &spec.series[0];
    assert!(!s.show_line);
    assert_eq!(s.points.len(), 2);
    assert_eq!((s.points[0].x, s.points[0].y, s.points[0].label.as_deref()), (1.0, 2.0, Some("A")));
    assert_eq!((s.points[1].x, s.points[1].y, s.points[1].label.as_deref()), (3.0, 6.0, Some("B")));
  }

  #[test]
  fn fallbacks_for_labels_and_title() {
    let mut intent = curve_intent();
    intent.title = None;
    intent.y_label = None;
    let spec = build(&intent, Some(&[] as &[(f64, f64)]));
    assert_eq!(spec.title.as_deref(), Some("Chart"));
    assert_eq!(spec.y_axis.unwrap().label, "y");
  }

  #[test]
  fn missing_samples_for_a_curve_is_not_plottable() {
    assert!(!build(&curve_intent(), None).plottable);
  }

  #[test]
  fn build_is_deterministic() {
    let mut intent = curve_intent();
    intent.points = vec![Point { x: 1.0, y: 2.0, label: "A".into() }];
    let samples = [(0.0, 1.0), (0.5, 2.5)];
    let a = serde_json::to_string(&build(&intent, Some(&samples[..]))).unwrap();
    let b = serde_json::to_string(&build(&intent, Some(&samples[..]))).unwrap();
    assert_eq!(a, b);
  }
}
