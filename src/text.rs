//! Text normalization shared by matching and identifier comparison.

use serde_json::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Turn a string into a form appropriate for name matching.
///
/// The goal is not to retain a readable version of the string, but to yield
/// a normalized form suitable for comparisons and machine analysis:
/// NFKD-decomposed, combining marks stripped, lowercased, with every run of
/// non-alphanumeric characters collapsed to a single space.
///
/// Returns `None` when nothing survives normalization.
///
/// # Examples
///
/// ```
/// use dossier::text::match_form;
///
/// assert_eq!(match_form("Al-Qaeda"), Some("al qaeda".to_string()));
/// assert_eq!(match_form("Fédération"), Some("federation".to_string()));
/// assert_eq!(match_form("  ··· "), None);
/// ```
#[must_use]
pub fn match_form(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Convert a JSON value to its canonical string form.
///
/// Scalars are stringified and trimmed; `null`, empty strings, arrays and
/// objects yield `None`. Used to normalize caller-supplied foreign ids,
/// which arrive as arbitrary JSON.
#[must_use]
pub fn string_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
