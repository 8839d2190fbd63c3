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

/// Strip a markdown code fence around a model payload.
///
/// Handles a leading ```` ``` ```` line with an optional language tag
/// (```` ```json ````) and a trailing ```` ``` ````. Text without a fence is
/// only trimmed.
pub fn strip_code_fence(text: &str) -> &str {
  let mut s = text.trim();
  if let Some(rest) = s.strip_prefix("```") {
    // Drop the language tag (everything up to the first newline).
    s = match rest.find('\n') {
      Some(nl) => &rest[nl + 1..],
      None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    s = s.trim_end();
    if let Some(inner) = s.strip_suffix("```") {
      s = inner;
    }
  }
  s.trim()
}

/// Lowercase, trim and collapse internal whitespace runs to one space.
/// "  Living   Room " and "living room" normalize identically.
pub fn normalize_name(s: &str) -> String {
  s.split_whitespace()
    .map(|w| w.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Remove all whitespace.
pub fn strip_whitespace(s: &str) -> String {
  s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
