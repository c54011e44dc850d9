//! Domain models used by the backend: tasks, subtasks, hints and approach checks.

use serde::{Deserialize, Serialize};

/// Coarse difficulty label attached to every task.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
  /// The generator gave no (or an unrecognized) label.
  #[default]
  Unspecified,
}

impl Difficulty {
  /// Lenient parse of generator output. Also accepts the German labels the
  /// assignment sheets and older prompts use.
  pub fn parse_lenient(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "easy" | "leicht" | "einfach" => Difficulty::Easy,
      "medium" | "mittel" | "moderate" => Difficulty::Medium,
      "hard" | "difficult" | "anspruchsvoll" | "schwer" => Difficulty::Hard,
      _ => Difficulty::Unspecified,
    }
  }
}

/// A top-level assignment item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Task {
  /// Identifier as printed on the sheet ("1", "2b", "A3"); not necessarily numeric.
  pub number: String,
  pub topic: String,
  pub difficulty: Difficulty,
  /// Full statement of the parent task, without the subtasks.
  pub task: String,
  pub subtasks: Vec<Subtask>,
}

/// A lettered sub-part; the unit hints/checks/plots operate on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
  pub label: String,
  pub task: String,
  /// Socratic guiding questions, ideally 3–5.
  pub questions: Vec<String>,
}

/// Directiveness of a hint. Level progression is driven by the caller.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(into = "u8")]
pub enum HintLevel {
  Socratic,
  Directive,
  Specific,
}

impl HintLevel {
  /// Anything outside 1..=3 falls back to the gentlest level.
  pub fn from_number(n: i64) -> Self {
    match n {
      2 => HintLevel::Directive,
      3 => HintLevel::Specific,
      _ => HintLevel::Socratic,
    }
  }

  pub fn as_number(self) -> u8 {
    match self {
      HintLevel::Socratic => 1,
      HintLevel::Directive => 2,
      HintLevel::Specific => 3,
    }
  }
}

impl From<HintLevel> for u8 {
  fn from(l: HintLevel) -> u8 { l.as_number() }
}

#[derive(Clone, Debug, Serialize)]
pub struct Hint {
  pub hint: String,
  pub encouragement: String,
  pub level: HintLevel,
}

/// Feedback on a student's work sample. Never contains the solution.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproachCheck {
  pub is_on_right_track: bool,
  pub overall_assessment: String,
  pub strengths: Vec<String>,
  pub improvements: Vec<String>,
  pub specific_issue: Option<String>,
  pub next_step: String,
  pub encouragement: String,
  /// 1 = completely wrong … 5 = perfect.
  pub confidence_score: u8,
}
