//! Animation scripts for the browser player (GSAP + KaTeX on the front end).
//!
//! The generator's JSON is normalized into a fixed vocabulary so the player
//! never sees an effect or position it cannot handle.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const MIN_DURATION: f64 = 0.1;
pub const MAX_DURATION: f64 = 10.0;
pub const DEFAULT_DURATION: f64 = 1.0;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
  #[default]
  FadeIn,
  FadeOut,
  Scale,
  Move,
  Highlight,
  Transform,
  Bounce,
}

impl Effect {
  fn parse(s: &str) -> Option<Self> {
    Some(match s.trim() {
      "fadeIn" => Effect::FadeIn,
      "fadeOut" => Effect::FadeOut,
      "scale" => Effect::Scale,
      "move" => Effect::Move,
      "highlight" => Effect::Highlight,
      "transform" => Effect::Transform,
      "bounce" => Effect::Bounce,
      _ => return None,
    })
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
  #[default]
  Center,
  Top,
  Bottom,
  Left,
  Right,
}

impl Position {
  fn parse(s: &str) -> Option<Self> {
    Some(match s.trim().to_lowercase().as_str() {
      "center" | "centre" => Position::Center,
      "top" => Position::Top,
      "bottom" => Position::Bottom,
      "left" => Position::Left,
      "right" => Position::Right,
      _ => return None,
    })
  }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnimationStep {
  pub id: u32,
  pub description: String,
  pub latex: String,
  pub animation: Effect,
  /// Seconds, clamped to `[MIN_DURATION, MAX_DURATION]`.
  pub duration: f64,
  pub position: Position,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub highlight: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnimationScript {
  pub title: String,
  pub steps: Vec<AnimationStep>,
}

/// Never fails for an object or array; a non-object payload yields an
/// untitled, empty script.
pub fn normalize(raw: &Value) -> AnimationScript {
  let obj = raw.as_object();
  let title = obj
    .and_then(|o| o.get("title"))
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .unwrap_or("Animation")
    .to_string();

  let steps = obj
    .and_then(|o| o.get("steps"))
    .and_then(Value::as_array)
    .map(|arr| arr.iter().filter_map(Value::as_object).enumerate().map(|(i, s)| step(i, s)).collect::<Vec<_>>())
    .unwrap_or_default();

  if steps.len() < 3 {
    debug!(target: "coach", steps = steps.len(), "Animation script has fewer than 3 steps");
  }
  AnimationScript { title, steps }
}

fn step(index: usize, s: &Map<String, Value>) -> AnimationStep {
  let text = |k: &str| s.get(k).and_then(Value::as_str).map(|v| v.trim().to_string());

  let id = s
    .get("id")
    .and_then(Value::as_u64)
    .and_then(|n| u32::try_from(n).ok())
    .unwrap_or(index as u32 + 1);

  let duration = s
    .get("duration")
    .and_then(Value::as_f64)
    .filter(|d| d.is_finite())
    .map(|d| d.clamp(MIN_DURATION, MAX_DURATION))
    .unwrap_or(DEFAULT_DURATION);

  AnimationStep {
    id,
    description: text("description").unwrap_or_default(),
    latex: text("latex").unwrap_or_default(),
    animation: text("animation").and_then(|a| Effect::parse(&a)).unwrap_or_default(),
    duration,
    position: text("position").and_then(|p| Position::parse(&p)).unwrap_or_default(),
    highlight: text("highlight").filter(|h| !h.is_empty()),
  }
}
