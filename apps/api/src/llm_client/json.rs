//! Response cleaning for structured generation output.
//!
//! Providers wrap JSON in markdown fences, add a sentence before or after it, or leave
//! a trailing comma behind. `parse_json_response` strips the fences, cuts out the
//! outermost bracketed value, and attempts one trailing-comma repair before giving up.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::llm_client::LlmError;

/// Longest slice of offending content carried in a parse error.
const MAX_ERROR_CONTENT_CHARS: usize = 2000;

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
///
/// Only a fence that opens a line before any `{`/`[` counts; backticks inside a JSON
/// string value are left alone. The closing fence is the last one in the text.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(start) = opening_fence(text) else {
        return text;
    };
    let after_open = &text[start + 3..];
    // Skip the info string ("json", "JSON", ...) up to the end of the fence line.
    let body = match after_open.find('\n') {
        Some(newline) if !after_open[..newline].contains(['{', '[']) => &after_open[newline + 1..],
        _ => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Byte offset of a line-opening fence that precedes the first bracket, if any.
fn opening_fence(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if line[indent..].starts_with("```") {
            return Some(offset + indent);
        }
        if line.contains(['{', '[']) {
            return None;
        }
        offset += line.len();
    }
    None
}

/// Returns the outermost `{...}` or `[...]` value in `text`, whichever opens first.
///
/// String literals are skipped so brackets inside them don't count. If the value never
/// closes (truncated output), everything from the opening bracket is returned.
pub fn extract_outermost_value(text: &str) -> &str {
    let Some(start) = text.find(['{', '[']) else {
        return text;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[start..start + offset + c.len_utf8()];
                }
            }
            _ => {}
        }
    }

    &text[start..]
}

/// Fences stripped, then the outermost bracketed value.
pub fn clean_json_response(text: &str) -> &str {
    extract_outermost_value(strip_json_fences(text))
}

/// Removes commas that directly precede a closing `}` or `]`, ignoring string contents.
pub fn repair_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<String> = None;

    for c in text.chars() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        if let Some(held) = pending_comma.as_mut() {
            if c.is_whitespace() {
                held.push(c);
                continue;
            }
            let held = pending_comma.take().unwrap_or_default();
            if c == '}' || c == ']' {
                // Drop the comma, keep the whitespace.
                out.push_str(&held[1..]);
            } else {
                out.push_str(&held);
            }
        }

        match c {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if let Some(held) = pending_comma {
        out.push_str(&held);
    }
    out
}

/// Cleans `raw` and deserializes it, with one bounded trailing-comma repair.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let cleaned = clean_json_response(raw);

    let first_error = match serde_json::from_str::<T>(cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let repaired = repair_trailing_commas(cleaned);
    if repaired != cleaned {
        if let Ok(value) = serde_json::from_str::<T>(&repaired) {
            debug!("JSON response parsed after trailing-comma repair");
            return Ok(value);
        }
    }

    Err(LlmError::Parse {
        message: first_error.to_string(),
        content: cleaned.chars().take(MAX_ERROR_CONTENT_CHARS).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        key: String,
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_with_leading_prose() {
        let input = "Here is the plan:\n```json\n[1, 2]\n```\nLet me know!";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_backticks_inside_string_are_not_a_fence() {
        let input = r#"{"note": "wrap code in ``` fences"}"#;
        assert_eq!(strip_json_fences(input), input);

        let parsed: Sample =
            parse_json_response(r#"{"key": "wrap code in ``` fences"}"#).unwrap();
        assert_eq!(parsed.key, "wrap code in ``` fences");
    }

    #[test]
    fn test_fenced_value_may_contain_backticks() {
        let input = "```json\n{\"key\": \"use ``` here\"}\n```";
        let parsed: Sample = parse_json_response(input).unwrap();
        assert_eq!(parsed.key, "use ``` here");
    }

    #[test]
    fn test_extract_outermost_object_ignores_surrounding_text() {
        let input = "Sure! {\"a\": {\"b\": [1, 2]}} hope that helps {\"c\": 1}";
        assert_eq!(extract_outermost_value(input), "{\"a\": {\"b\": [1, 2]}}");
    }

    #[test]
    fn test_extract_outermost_ignores_brackets_in_strings() {
        let input = r#"{"note": "use } and ] freely \" ok", "n": 1} tail"#;
        assert_eq!(
            extract_outermost_value(input),
            r#"{"note": "use } and ] freely \" ok", "n": 1}"#
        );
    }

    #[test]
    fn test_extract_prefers_first_opening_bracket() {
        assert_eq!(extract_outermost_value("x [ {\"a\":1} ] y"), "[ {\"a\":1} ]");
    }

    #[test]
    fn test_extract_unclosed_returns_rest() {
        assert_eq!(extract_outermost_value("{\"a\": [1, 2"), "{\"a\": [1, 2");
    }

    #[test]
    fn test_repair_trailing_commas() {
        assert_eq!(repair_trailing_commas("{\"a\": 1,}"), "{\"a\": 1}");
        assert_eq!(repair_trailing_commas("[1, 2,\n]"), "[1, 2\n]");
        assert_eq!(repair_trailing_commas("{\"s\": \"a,}\"}"), "{\"s\": \"a,}\"}");
        assert_eq!(repair_trailing_commas("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn test_parse_json_response_fenced_with_trailing_comma() {
        let raw = "```json\n{\"key\": \"value\",}\n```";
        let parsed: Sample = parse_json_response(raw).unwrap();
        assert_eq!(
            parsed,
            Sample {
                key: "value".to_string()
            }
        );
    }

    #[test]
    fn test_parse_json_response_error_carries_content() {
        let raw = "not json at all {\"key\": }";
        let err = parse_json_response::<Sample>(raw).unwrap_err();
        match err {
            LlmError::Parse { content, .. } => assert_eq!(content, "{\"key\": }"),
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
