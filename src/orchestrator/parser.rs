//! Tolerant decoding of model replies.
//!
//! Models routinely wrap the requested JSON array in prose or markdown
//! fences, or truncate it mid-object when they hit their output budget.
//! Recovery runs as a chain of staged fallbacks, each attempted only
//! when the previous stage fails, so every stage can be exercised on
//! its own with crafted input.

use serde_json::Value;

/// Recover a list of suggestion-like JSON objects from a raw reply.
///
/// Always returns a list (possibly empty), never errors, and preserves
/// the order records appeared in the source text. Schema completion is
/// the coordinator's job; this only recovers structure.
pub fn parse_suggestions(raw: &str) -> Vec<Value> {
    if let Some(list) = parse_direct(raw) {
        return list;
    }
    if let Some(list) = parse_fenced_block(raw) {
        return list;
    }
    if let Some(list) = parse_bracket_slice(raw) {
        return list;
    }
    scan_objects(raw)
}

/// Stage 1: the whole reply is the JSON array we asked for.
fn parse_direct(raw: &str) -> Option<Vec<Value>> {
    parse_array(raw.trim())
}

/// Stage 2: the array is inside a markdown code fence, with or without
/// a `json` language tag.
fn parse_fenced_block(raw: &str) -> Option<Vec<Value>> {
    let start = raw.find("```")?;
    let mut body = &raw[start + 3..];
    if let Some(rest) = body.strip_prefix("json") {
        body = rest;
    }
    let end = body.find("```")?;
    parse_array(body[..end].trim())
}

/// Stage 3: slice from the first `[` to the last `]` and repair the
/// usual damage: trailing commas, and a tail cut off mid-object (close
/// after the last complete object and terminate the array).
fn parse_bracket_slice(raw: &str) -> Option<Vec<Value>> {
    let start = raw.find('[')?;
    let tail = &raw[start..];

    if let Some(end) = tail.rfind(']') {
        if let Some(list) = parse_array(&strip_trailing_commas(&tail[..=end])) {
            return Some(list);
        }
    }

    let last_object = tail.rfind('}')?;
    let mut repaired = strip_trailing_commas(&tail[..=last_object]);
    repaired.push(']');
    parse_array(&repaired)
}

/// Stage 4, last resort: scan for balanced top-level `{…}` substrings
/// and keep whichever parse on their own.
fn scan_objects(raw: &str) -> Vec<Value> {
    let mut results = Vec::new();
    let mut depth = 0usize;
    let mut object_start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if in_string {
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
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    object_start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = object_start.take() {
                        let candidate = &raw[start..i + 1];
                        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                            results.push(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    results
}

fn parse_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Drop commas that directly precede a closing bracket or brace.
/// String-aware so commas inside literals survive.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && (chars[j] == ']' || chars[j] == '}') {
                    continue;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}
