//! Recovery of structured JSON from free-form generated text.
//!
//! Generation backends rarely return clean JSON even when asked. The
//! extractor tries a sequence of increasingly forgiving strategies and
//! returns the first that yields a valid object or array. Text with no
//! recoverable structure is not an error; callers keep the raw text and
//! get `None` here.

use regex_lite::Regex;
use serde_json::Value;

/// Try to pull a JSON object or array out of generated text.
pub fn extract_structured(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Strategy 1: the whole response is already JSON.
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if is_structured(&value) {
            return Some(value);
        }
    }

    // Strategy 2: a fenced code block wraps the payload.
    if let Some(inner) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if is_structured(&value) {
                return Some(value);
            }
        }
        // The fence told us where the payload is; keep digging inside it.
        if let Some(value) = balanced_candidates(inner) {
            return Some(value);
        }
    }

    // Strategy 3: scan for a balanced object or array embedded in prose.
    if let Some(value) = balanced_candidates(trimmed) {
        return Some(value);
    }

    // Strategy 4: repair the most promising candidate and retry once.
    let candidate = first_balanced_span(trimmed)
        .or_else(|| fenced_block(trimmed).map(str::trim))?;
    let repaired = repair(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) if is_structured(&value) => Some(value),
        _ => None,
    }
}

fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn fenced_block(text: &str) -> Option<&str> {
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok()?;
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Parse every balanced `{...}` / `[...]` span in order of appearance and
/// return the first that is valid JSON.
fn balanced_candidates(text: &str) -> Option<Value> {
    let mut offset = 0;
    while let Some(span) = first_balanced_span(&text[offset..]) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            if is_structured(&value) {
                return Some(value);
            }
        }
        let span_start = span.as_ptr() as usize - text.as_ptr() as usize;
        offset = span_start + 1;
        if offset >= text.len() {
            break;
        }
    }
    None
}

/// Find the first brace- or bracket-balanced span, honoring string
/// literals and escapes so braces inside strings do not count.
fn first_balanced_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    // Unbalanced to the end; hand the open span to the repair pass.
    Some(&text[start..])
}

/// Best-effort repairs for almost-JSON: strip trailing commas and close
/// an unterminated trailing string.
fn repair(candidate: &str) -> String {
    let mut out = String::with_capacity(candidate.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in candidate.chars() {
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
            '}' | ']' => {
                // Drop a comma left dangling before the closer.
                while out.ends_with(|p: char| p.is_whitespace()) {
                    out.pop();
                }
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
    }

    // Close any containers left open at the end of the text.
    let mut stack = Vec::new();
    let mut in_str = false;
    let mut esc = false;
    for c in out.chars() {
        if in_str {
            if esc {
                esc = false;
            } else if c == '\\' {
                esc = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    while let Some(closer) = stack.pop() {
        while out.ends_with(|p: char| p.is_whitespace()) {
            out.pop();
        }
        if out.ends_with(',') {
            out.pop();
        }
        out.push(closer);
    }

    out
}
