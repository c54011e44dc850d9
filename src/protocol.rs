//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//! All JSON keys are camelCase.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::animation::AnimationScript;
use crate::domain::{ApproachCheck, Hint, Task};

//
// Requests
//

#[derive(Debug, Default, Deserialize)]
pub struct ClarityIn {
  #[serde(default, deserialize_with = "text_only")]
  pub task: Option<String>,
}

/// Which subtask a coaching request is about. Shared by hint, check,
/// visualize, animate and plot.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtaskContext {
  /// Sent as either `"1"` or `1` by the front end.
  #[serde(deserialize_with = "string_or_number")]
  pub task_number: String,
  #[serde(deserialize_with = "text_or_empty")]
  pub task_text: String,
  #[serde(deserialize_with = "text_or_empty")]
  pub topic: String,
  #[serde(deserialize_with = "string_or_number")]
  pub sub_label: String,
  /// Anything but a string (null, numbers, objects) counts as missing.
  #[serde(deserialize_with = "text_or_empty")]
  pub subtask_text: String,
}

impl SubtaskContext {
  /// Template variables for the `{task_number}`-style placeholders.
  pub fn template_vars(&self) -> [(&'static str, &str); 5] {
    [
      ("task_number", self.task_number.as_str()),
      ("topic", self.topic.as_str()),
      ("task_text", self.task_text.as_str()),
      ("sub_label", self.sub_label.as_str()),
      ("subtask_text", self.subtask_text.as_str()),
    ]
  }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::String(s)) => s,
    Some(Value::Number(n)) => n.to_string(),
    Some(Value::Bool(b)) => b.to_string(),
    _ => String::new(),
  })
}

fn text_only<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::String(s)) => Some(s),
    _ => None,
  })
}

fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(text_only(d)?.unwrap_or_default())
}

/// `previousHints` may be one string or a list of them.
#[derive(Clone, Debug, PartialEq)]
pub enum PreviousHints {
  One(String),
  Many(Vec<String>),
}

impl PreviousHints {
  /// Non-blank hints joined one per line; `None` when nothing is left.
  pub fn joined(&self) -> Option<String> {
    let parts: Vec<&str> = match self {
      PreviousHints::One(s) => vec![s.trim()],
      PreviousHints::Many(v) => v.iter().map(|s| s.trim()).collect(),
    };
    let parts: Vec<&str> = parts.into_iter().filter(|s| !s.is_empty()).collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
  }
}

/// Non-string list items are skipped; any other shape means "no previous hints".
fn hints_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<PreviousHints>, D::Error> {
  Ok(match Option::<Value>::deserialize(d)? {
    Some(Value::String(s)) => Some(PreviousHints::One(s)),
    Some(Value::Array(items)) => Some(PreviousHints::Many(
      items.into_iter().filter_map(|v| if let Value::String(s) = v { Some(s) } else { None }).collect(),
    )),
    _ => None,
  })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintIn {
  #[serde(flatten)]
  pub ctx: SubtaskContext,
  #[serde(default)]
  pub hint_level: Option<Value>,
  #[serde(default, deserialize_with = "hints_lenient")]
  pub previous_hints: Option<PreviousHints>,
}

impl HintIn {
  /// Numeric level if one was sent as a number or numeric string.
  pub fn level_number(&self) -> Option<i64> {
    match self.hint_level.as_ref()? {
      Value::Number(n) => n.as_i64(),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
  #[serde(flatten)]
  pub ctx: SubtaskContext,
  #[serde(default, deserialize_with = "text_only")]
  pub student_work: Option<String>,
}

//
// Responses
//

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DecomposeOut {
  Tasks(Vec<Task>),
  #[serde(rename_all = "camelCase")]
  Unparsed { error: String, raw_output: String },
}

#[derive(Debug, Serialize)]
pub struct HintOut {
  #[serde(flatten)]
  pub hint: Hint,
  pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
  #[serde(flatten)]
  pub check: ApproachCheck,
  pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct VisualizeOut {
  pub visualization: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimateOut {
  pub animation_data: AnimationScript,
  pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub status: &'static str,
  pub message: String,
  pub api_key_valid: bool,
}
