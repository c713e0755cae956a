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

/// Remove one layer of matching quotes the model likes to wrap answers in.
pub fn strip_wrapping_quotes(s: &str) -> &str {
  let t = s.trim();
  for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»')] {
    if t.len() >= open.len_utf8() + close.len_utf8() && t.starts_with(open) && t.ends_with(close) {
      return t[open.len_utf8()..t.len() - close.len_utf8()].trim();
    }
  }
  t
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with user answers or full completions.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  match s.char_indices().nth(max_chars) {
    None => s.to_string(),
    Some((cut, _)) => format!("{}… ({} bytes total)", &s[..cut], s.len()),
  }
}
