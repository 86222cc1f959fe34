//! Small utility helpers used across modules.

use uuid::Uuid;

use crate::error::AppError;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Parse a document identifier coming from a path or body.
pub fn parse_id(what: &str, raw: &str) -> Result<Uuid, AppError> {
  Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidArgument(format!("invalid {what} id: {raw:?}")))
}

/// Short unique id for structure nodes, e.g. `t_3f2a...`.
pub fn node_id(prefix: &str) -> String {
  format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Trimmed, non-empty text or None.
pub fn non_blank(s: &str) -> Option<&str> {
  let t = s.trim();
  if t.is_empty() { None } else { Some(t) }
}

/// Log-safe truncation for large strings (char-boundary aware).
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
