//! Normalizes the completion service's "decompose this text" answer into a task tree.
//!
//! The generator is free text dressed as JSON, so nothing about its shape is
//! guaranteed. We accept:
//!   - `{"tasks": [...]}` (the documented shape)
//!   - a bare `[...]` (tolerated upstream inconsistency, kept for compatibility)
//!   - either of the above wrapped in a Markdown code fence
//!
//! Per-element validation is advisory: missing or odd fields get defaults and a
//! warning, they never fail the whole call.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Difficulty, Subtask, Task};
use crate::util::trunc_for_log;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecompositionErrorKind {
  /// Upstream text was not JSON at all.
  InvalidJson,
  /// Valid JSON, but neither `{tasks: [...]}` nor a list.
  MalformedSchema,
}

/// Recoverable "could not parse" outcome. Carries the raw upstream text so the
/// caller can surface it for diagnosis.
#[derive(Debug, Error)]
#[error("{}", self.message())]
pub struct DecompositionError {
  pub kind: DecompositionErrorKind,
  pub raw: String,
}

impl DecompositionError {
  pub fn message(&self) -> &'static str {
    match self.kind {
      DecompositionErrorKind::InvalidJson => "Could not parse the task analysis as JSON.",
      DecompositionErrorKind::MalformedSchema => {
        "The task analysis did not have the expected format (field 'tasks' missing or not a list)."
      }
    }
  }
}

/// Parse the raw completion text, then normalize it.
pub fn normalize_text(raw: &str) -> Result<Vec<Task>, DecompositionError> {
  match serde_json::from_str::<Value>(strip_code_fence(raw)) {
    Ok(v) => normalize(&v, raw),
    Err(e) => {
      warn!(target: "decompose", error = %e, raw = %trunc_for_log(raw, 200), "Decomposition output is not JSON");
      Err(DecompositionError { kind: DecompositionErrorKind::InvalidJson, raw: raw.to_string() })
    }
  }
}

/// "```json\n{...}\n```" -> "{...}". Unfenced text is only trimmed.
fn strip_code_fence(raw: &str) -> &str {
  let t = raw.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let body = rest.split_once('\n').map_or("", |(_, b)| b);
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn a parsed decomposition payload into the task list.
/// `raw_text` is only kept for the error payload.
pub fn normalize(raw: &Value, raw_text: &str) -> Result<Vec<Task>, DecompositionError> {
  let items = match raw {
    Value::Object(map) => match map.get("tasks") {
      Some(Value::Array(items)) => items,
      _ => {
        return Err(DecompositionError {
          kind: DecompositionErrorKind::MalformedSchema,
          raw: raw_text.to_string(),
        })
      }
    },
    Value::Array(items) => {
      debug!(target: "decompose", count = items.len(), "Upstream returned a bare task list; accepting");
      items
    }
    _ => {
      return Err(DecompositionError {
        kind: DecompositionErrorKind::MalformedSchema,
        raw: raw_text.to_string(),
      })
    }
  };

  let tasks: Vec<Task> = items.iter().enumerate().map(|(i, v)| task_from_value(i, v)).collect();
  report_contract_violations(&tasks);
  Ok(tasks)
}

fn task_from_value(index: usize, v: &Value) -> Task {
  match v {
    Value::Object(_) => Task {
      number: text_field(v, &["number", "nr"]).unwrap_or_else(|| (index + 1).to_string()),
      topic: text_field(v, &["topic"]).unwrap_or_default(),
      difficulty: text_field(v, &["difficulty"])
        .map(|d| Difficulty::parse_lenient(&d))
        .unwrap_or_default(),
      task: text_field(v, &["task", "text", "statement"]).unwrap_or_default(),
      subtasks: v
        .get("subtasks")
        .and_then(Value::as_array)
        .map(|subs| subs.iter().enumerate().map(|(j, s)| subtask_from_value(j, s)).collect())
        .unwrap_or_default(),
    },
    other => Task {
      number: (index + 1).to_string(),
      topic: String::new(),
      difficulty: Difficulty::Unspecified,
      task: scalar_to_string(other).unwrap_or_default(),
      subtasks: vec![],
    },
  }
}

fn subtask_from_value(index: usize, v: &Value) -> Subtask {
  match v {
    Value::Object(_) => Subtask {
      label: text_field(v, &["label"]).unwrap_or_else(|| position_label(index)),
      task: text_field(v, &["task", "text", "statement"]).unwrap_or_default(),
      questions: v
        .get("questions")
        .and_then(Value::as_array)
        .map(|qs| qs.iter().filter_map(scalar_to_string).filter(|q| !q.trim().is_empty()).collect())
        .unwrap_or_default(),
    },
    other => Subtask {
      label: position_label(index),
      task: scalar_to_string(other).unwrap_or_default(),
      questions: vec![],
    },
  }
}

/// First present key among `keys` rendered as text (numbers are stringified).
fn text_field(v: &Value, keys: &[&str]) -> Option<String> {
  keys.iter().find_map(|k| v.get(*k).and_then(scalar_to_string))
}

fn scalar_to_string(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// a, b, …, z, then aa, ab, … for absurdly long lists.
fn position_label(index: usize) -> String {
  let letters = b'z' - b'a' + 1;
  let mut n = index;
  let mut out = Vec::new();
  loop {
    out.push((b'a' + (n % letters as usize) as u8) as char);
    if n < letters as usize {
      break;
    }
    n = n / letters as usize - 1;
  }
  out.iter().rev().collect()
}

/// Uniqueness and question-count are generation contracts, not hard invariants.
/// We log them and leave the data alone.
fn report_contract_violations(tasks: &[Task]) {
  let mut numbers = HashSet::new();
  for t in tasks {
    if !numbers.insert(t.number.as_str()) {
      warn!(target: "decompose", number = %t.number, "Duplicate task number in decomposition");
    }
    let mut labels = HashSet::new();
    for s in &t.subtasks {
      if !labels.insert(s.label.as_str()) {
        warn!(target: "decompose", number = %t.number, label = %s.label, "Duplicate subtask label");
      }
      if !(3..=5).contains(&s.questions.len()) {
        debug!(target: "decompose", number = %t.number, label = %s.label, count = s.questions.len(), "Question count outside 3-5");
      }
    }
  }
}
