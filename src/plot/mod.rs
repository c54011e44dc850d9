//! Plot pipeline: intent classifier -> expression evaluator -> chart builder.
//!
//! Everything in here is synchronous and pure. The completion call that
//! produces the plot decision happens in `logic`; this module only turns the
//! decision text into something a browser can draw.

pub mod chart;
pub mod chartjs;
pub mod expr;
pub mod intent;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use self::chart::ChartSpec;
use self::expr::{EvalError, DEFAULT_SAMPLES};
use self::intent::{ClassifyError, GraphType, PlotIntent};

pub const ABSTRACT_MESSAGE: &str =
  "This task is too abstract for a concrete graph; it contains general parameters without specific values.";
pub const EVALUATION_FAILED_MESSAGE: &str = "The function could not be evaluated.";

/// Wire shape of a plot answer. Not plottable carries only `message`.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlotOutcome {
  pub plottable: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub graph_type: Option<GraphType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub chart_spec: Option<ChartSpec>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub chart_type: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plot_data: Option<Value>,
}

impl PlotOutcome {
  pub fn not_plottable(message: impl Into<String>) -> Self {
    Self { plottable: false, message: Some(message.into()), graph_type: None, chart_spec: None, chart_type: None, plot_data: None }
  }
}

pub fn render_text(raw: &str) -> Result<PlotOutcome, ClassifyError> {
  let v: Value = serde_json::from_str(raw)?;
  render(&v)
}

/// Run a parsed plot decision through the whole pipeline.
///
/// Only a payload that is not a JSON object is an error. Unplottable tasks and
/// expressions that fail to evaluate come back as `plottable: false`.
pub fn render(raw: &Value) -> Result<PlotOutcome, ClassifyError> {
  let intent = intent::classify(raw)?;
  if !intent.plottable {
    info!(target: "plot", reason = %intent.reason, "Task not plottable");
    return Ok(PlotOutcome::not_plottable(intent.reason));
  }

  let sampled = match sample(&intent) {
    Ok(s) => s,
    Err(message) => return Ok(PlotOutcome::not_plottable(message)),
  };

  let spec = chart::build(&intent, sampled.as_deref());
  if !spec.plottable {
    return Ok(PlotOutcome::not_plottable(spec.reason.unwrap_or_else(|| EVALUATION_FAILED_MESSAGE.into())));
  }
  let plot_data = chartjs::to_chartjs(&spec);
  info!(
    target: "plot",
    graph_type = ?intent.graph_type,
    series = spec.series.len(),
    "Chart built"
  );
  Ok(PlotOutcome {
    plottable: true,
    message: None,
    graph_type: Some(intent.graph_type),
    chart_spec: Some(spec),
    chart_type: Some("chartjs"),
    plot_data,
  })
}

/// Samples for curve types, `None` for marker-only charts. The error is the
/// user-facing message; evaluator details stay in the log.
fn sample(intent: &PlotIntent) -> Result<Option<Vec<(f64, f64)>>, String> {
  if !intent.graph_type.is_sampled() {
    return Ok(None);
  }
  let expression = intent.expression.as_deref().unwrap_or_default();
  match expr::evaluate(expression, &intent.domain, DEFAULT_SAMPLES) {
    Ok(pairs) => Ok(Some(pairs)),
    Err(EvalError::AbstractOrInvalidExpression { detail }) => {
      info!(target: "plot", %expression, %detail, "Expression is abstract or invalid");
      Err(ABSTRACT_MESSAGE.into())
    }
    Err(e) => {
      warn!(target: "plot", %expression, error = %e, "Expression evaluation failed");
      Err(EVALUATION_FAILED_MESSAGE.into())
    }
  }
}
