//! Loading agent configuration (prompt templates) from TOML.
//!
//! See `AgentConfig` and `Prompts` for expected schema. Every prompt key is
//! optional; anything missing keeps its built-in default.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts used by the coaching logic. Templates take `{placeholders}` filled
/// by `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Decomposition
  pub decompose_system: String,
  pub decompose_user_template: String,
  // Leveled hints
  pub hint_system: String,
  pub hint_user_template: String,
  pub hint_level_1: String,
  pub hint_level_2: String,
  pub hint_level_3: String,
  // Approach check
  pub check_system: String,
  pub check_user_template: String,
  // Concept overview
  pub visualize_system: String,
  pub visualize_user_template: String,
  // Animation script
  pub animate_system: String,
  pub animate_user_template: String,
  // Plot decision
  pub plot_system: String,
  pub plot_user_template: String,
  // Upload extraction (vision)
  pub extract_pdf_instruction: String,
  pub extract_image_instruction: String,
}

const SUBTASK_BLOCK: &str = "**Task {task_number}: {topic}**\nMain task: {task_text}\n\n**Subtask {sub_label}:**\n{subtask_text}";

impl Default for Prompts {
  fn default() -> Self {
    Self {
      decompose_system: "You are a patient, Socratic math teacher. You write very task-specific guiding questions \
and answer ONLY with a valid JSON object with the single field 'tasks'."
        .into(),
      decompose_user_template: r#"Analyse the following assignment text (it may contain several tasks with subtasks).
Recognise tasks (1., 2., 3., ...) and subtasks (a), b), c), ...). For every task produce:
- "number": task number as a string (e.g. "1")
- "topic": short topic (e.g. "Cubic equations")
- "difficulty": "easy", "medium" or "hard"
- "task": full text of the parent task (without the individual subtasks)
- "subtasks": list of objects with "label" (letter, e.g. "a"), "task" (subtask text) and
  "questions" (3-5 Socratic questions as strings)

Every question must mention at least ONE concrete element of its subtask (a number such as 27,
a term such as x^3, or a concept such as "root"). Avoid generic questions like "How can you solve
the equation?". Cover structure, the next transformation step, the operation needed, and
checking/interpreting the result.

Return a JSON object with exactly one field "tasks", e.g.
{"tasks":[{"number":"1","topic":"Cubic equations","difficulty":"medium","task":"Show that the equation has exactly one real solution.","subtasks":[{"label":"a","task":"x^3 - 27 = 0","questions":["...","...","..."]}]}]}
No prose outside the JSON object, no markdown code fences.

Assignment text:

{text}"#
        .into(),
      hint_system: "You are a patient, Socratic math teacher. You help students understand by themselves \
without revealing the solution."
        .into(),
      hint_user_template: format!(
        "You NEVER reveal the complete solution.\n\n{{strategy}}\n\n{}\n\n{{previous_hints}}\n\n\
Answer in this JSON format:\n{{\"hint\": \"your hint (max 2-3 sentences)\", \"encouragement\": \"one encouraging sentence\"}}\n\
Keep the hint short, use $...$ for inline LaTeX, do not reveal the solution.",
        SUBTASK_BLOCK
      ),
      hint_level_1: "LEVEL 1 - SOCRATIC QUESTION: ask one thoughtful question that leads to the core of the problem. \
Do not reveal the solution; refer to a concrete element of the task."
        .into(),
      hint_level_2: "LEVEL 2 - DIRECTIVE HINT: name the concrete next step without anticipating the result.".into(),
      hint_level_3: "LEVEL 3 - SPECIFIC HELP: address the critical step directly and name a formula or method, \
but still do not give the full solution."
        .into(),
      check_system: "You are a patient math teacher who reviews student work constructively. You give helpful \
feedback without revealing the solution."
        .into(),
      check_user_template: format!(
        "You NEVER reveal the complete solution.\n\n{}\n\n**Student work:**\n{{student_work}}\n\n\
Check understanding of the problem, suitability of the approach, correctness of the steps, calculation or logic \
errors, and notation.\n\nAnswer in this JSON format:\n\
{{\"isOnRightTrack\": true/false, \"overallAssessment\": \"1-2 sentences\", \"strengths\": [\"...\"], \
\"improvements\": [\"...\"], \"specificIssue\": \"optional\", \"nextStep\": \"hint for the next step\", \
\"encouragement\": \"...\", \"confidenceScore\": 1-5}}\n\
confidenceScore: 1 = completely wrong, 2 = wrong track, 3 = partly right, 4 = almost right, 5 = perfect.",
        SUBTASK_BLOCK
      ),
      visualize_system: "You are a mathematics visualization assistant.".into(),
      visualize_user_template: format!(
        "Create a structured overview for the following subtask that highlights key facts and conceptual \
understanding.\n\n{}\n\nUse these sections with **bold** headings: Core concepts, Given information, Wanted, \
Relevant formulas, Important facts, Approach hints (without the solution). Use \"- \" bullets and LaTeX \
($...$ inline, $$...$$ display). Do NOT give the full solution.",
        SUBTASK_BLOCK
      ),
      animate_system: "You are an expert for mathematical visualizations and animations.".into(),
      animate_user_template: format!(
        "Create a step-by-step browser animation script for this task.\n\n{}\n\n\
Requirements: 3-5 clear steps, each with an explanation and a LaTeX formula.\n\
Answer with pure JSON:\n{{\"title\": \"short title\", \"steps\": [{{\"id\": 1, \"description\": \"...\", \
\"latex\": \"x^2 + 3x - 4 = 0\", \"animation\": \"fadeIn\", \"duration\": 1.0, \"position\": \"center\", \
\"highlight\": \"optional part to emphasise\"}}]}}\n\
Animations: fadeIn, fadeOut, scale, move, highlight, transform, bounce. Positions: center, top, bottom, left, right.",
        SUBTASK_BLOCK
      ),
      plot_system: "You are an expert for mathematical visualizations. Answer only with valid JSON.".into(),
      plot_user_template: format!(
        "Decide whether a graph is possible and useful for this task.\n\n{}\n\n\
Only a CONCRETE function with specific values is plottable (e.g. \"x^3 - 27\" or \"2x + 3\"). Abstract \
conditions such as \"f'(x1) = 0\" or parameters a, b, c without values -> plottable: false.\n\n\
Answer with pure JSON:\n{{\"plottable\": true/false, \"reason\": \"short reason\", \
\"graphType\": \"function\" | \"polynomial\" | \"line\" | \"circle\" | \"points\" | \"none\", \
\"function\": \"expression in Python syntax, e.g. x**3 - 27\", \
\"domain\": {{\"xMin\": -10, \"xMax\": 10, \"yMin\": -50, \"yMax\": 50}}, \"title\": \"...\", \"xLabel\": \"x\", \
\"yLabel\": \"f(x)\", \"points\": [{{\"x\": 1, \"y\": 2, \"label\": \"A\"}}], \
\"specialPoints\": [{{\"x\": 3, \"y\": 0, \"label\": \"Root\", \"color\": \"red\"}}]}}",
        SUBTASK_BLOCK
      ),
      extract_pdf_instruction: "Read all pages of this document with all math tasks and return ONLY the recognised text."
        .into(),
      extract_image_instruction: "Read the content of this task and return ONLY the text.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  load_agent_config(&path)
}

pub fn load_agent_config(path: &str) -> Option<AgentConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "clarity_coach", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "clarity_coach", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "clarity_coach", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn session_log_path_from_env() -> PathBuf {
  std::env::var("SESSION_LOG_PATH")
    .ok()
    .filter(|p| !p.trim().is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("./clarity_sessions.jsonl"))
}
