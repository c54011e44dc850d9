//! Chart.js scatter configuration rendered from a [`ChartSpec`].
//!
//! The browser front end feeds this straight into `new Chart(ctx, config)`.

use serde_json::{json, Value};

use super::chart::{ChartSpec, Series, SeriesRole};

/// `None` for specs that are not plottable; there is nothing to draw.
pub fn to_chartjs(spec: &ChartSpec) -> Option<Value> {
  if !spec.plottable {
    return None;
  }
  let (x_axis, y_axis) = (spec.x_axis.as_ref()?, spec.y_axis.as_ref()?);
  let title = spec.title.clone().unwrap_or_else(|| "Chart".into());

  let datasets: Vec<Value> = spec.series.iter().map(dataset).collect();
  let point_labels: Vec<Value> = spec
    .series
    .iter()
    .filter(|s| s.role != SeriesRole::SampledCurve)
    .flat_map(|s| s.points.iter())
    .map(|p| json!({ "x": p.x, "y": p.y, "label": p.label.clone().unwrap_or_default() }))
    .collect();

  Some(json!({
    "type": "scatter",
    "data": { "datasets": datasets },
    "options": {
      "responsive": true,
      "maintainAspectRatio": false,
      "plugins": {
        "title": { "display": true, "text": title, "font": { "size": 16, "weight": "bold" } },
        "legend": { "display": true, "position": "top" },
        "tooltip": { "enabled": true, "mode": "nearest", "intersect": false }
      },
      "scales": {
        "x": scale(&x_axis.label, x_axis.min, x_axis.max),
        "y": scale(&y_axis.label, y_axis.min, y_axis.max)
      },
      "interaction": { "mode": "nearest", "axis": "x", "intersect": false }
    },
    "pointLabels": point_labels
  }))
}

fn scale(label: &str, min: f64, max: f64) -> Value {
  json!({
    "type": "linear",
    "position": "center",
    "title": { "display": true, "text": label },
    "min": min,
    "max": max,
    "grid": { "color": "rgba(0, 0, 0, 0.1)" }
  })
}

fn dataset(s: &Series) -> Value {
  let data: Vec<Value> = s.points.iter().map(|p| json!({ "x": p.x, "y": p.y })).collect();
  match s.role {
    SeriesRole::SampledCurve => json!({
      "label": s.label,
      "data": data,
      "borderColor": s.color,
      "backgroundColor": "rgba(44, 95, 141, 0.1)",
      "borderWidth": 2,
      "pointRadius": 0,
      "showLine": true,
      "tension": 0.1,
      "fill": false
    }),
    SeriesRole::GivenPoints | SeriesRole::SpecialPoints => {
      // Per-point colors (special points may each carry their own).
      let colors: Vec<String> =
        s.points.iter().map(|p| p.color.clone().unwrap_or_else(|| s.color.clone())).collect();
      json!({
        "label": s.label,
        "data": data,
        "borderColor": colors,
        "backgroundColor": colors,
        "pointRadius": s.point_radius,
        "pointHoverRadius": s.point_radius + 2.0,
        "showLine": false
      })
    }
  }
}
