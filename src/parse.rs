//! Defensive parsing of provider output into a structured result.
//!
//! Models routinely wrap JSON in markdown fences and leave trailing commas.
//! Both are repaired before a strict parse; anything else is rejected as
//! [`Error::MalformedResult`].

use crate::error::{Error, Result};

/// Parses raw provider text into JSON, optionally requiring object keys.
#[derive(Debug, Clone, Default)]
pub struct ResultParser {
    required_keys: Vec<String>,
}

impl ResultParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject object results that lack any of `keys`.
    pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn parse(&self, raw: &str) -> Result<serde_json::Value> {
        let cleaned = strip_trailing_commas(strip_fences(raw));

        let value: serde_json::Value = serde_json::from_str(&cleaned)
            .map_err(|e| Error::MalformedResult(format!("{e}: {}", excerpt(&cleaned))))?;

        match &value {
            serde_json::Value::Object(map) => {
                if let Some(missing) = self.required_keys.iter().find(|k| !map.contains_key(*k)) {
                    return Err(Error::MalformedResult(format!(
                        "missing required key {missing:?}"
                    )));
                }
            }
            serde_json::Value::Array(_) => {}
            other => {
                return Err(Error::MalformedResult(format!(
                    "expected an object or array, got {}",
                    excerpt(&other.to_string())
                )));
            }
        }

        Ok(value)
    }
}

/// Remove an opening fence line (```` ``` ```` or ```` ```json ````) and a
/// closing fence, if present.
fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // The tag runs to the end of the fence line.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    text = text.trim_end();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Drop commas that directly precede `}` or `]` (ignoring whitespace),
/// leaving string literals untouched.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tagged_and_bare_fences() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_fences("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn trailing_commas_outside_strings_only() {
        assert_eq!(strip_trailing_commas("{\"a\":1,}"), "{\"a\":1}");
        assert_eq!(strip_trailing_commas("[1,2,\n ]"), "[1,2\n ]");
        assert_eq!(strip_trailing_commas("{\"a\":\",}\"}"), "{\"a\":\",}\"}");
        assert_eq!(strip_trailing_commas("{\"a\":\"\\\",}\",}"), "{\"a\":\"\\\",}\"}");
    }
}
