//! Small utility helpers used across modules.

/// Characters stripped by [`normalize`].
const STRIPPED_PUNCTUATION: &[char] = &[
  '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`', '~',
  '(', ')', '?',
];

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

/// Lowercase and drop the fixed punctuation set. Whitespace and everything
/// else is kept as-is, so normalizing twice is a no-op.
pub fn normalize(text: &str) -> String {
  text
    .to_lowercase()
    .chars()
    .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
    .collect()
}

/// Case-insensitive substring containment in either direction.
/// "World History" matches "history" and "Modern World History Facts".
pub fn fuzzy_title_match(a: &str, b: &str) -> bool {
  let a = a.trim().to_lowercase();
  let b = b.trim().to_lowercase();
  if a.is_empty() || b.is_empty() {
    return false;
  }
  a.contains(&b) || b.contains(&a)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
