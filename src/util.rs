//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
/// Cuts on a char boundary, so umlauts and math symbols never split.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut = s
    .char_indices()
    .map(|(i, _)| i)
    .take_while(|i| *i <= max)
    .last()
    .unwrap_or(0);
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Truncate a diagnostic for a client-facing error body (no size suffix).
pub fn trunc_detail(s: &str, max_chars: usize) -> String {
  s.chars().take(max_chars).collect()
}

/// True for missing, empty or whitespace-only text.
pub fn is_blank(s: Option<&str>) -> bool {
  s.map(|t| t.trim().is_empty()).unwrap_or(true)
}
