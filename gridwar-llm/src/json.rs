//! Lenient JSON extraction from model output
//!
//! Models wrap JSON in markdown fences, prepend chatter, or append
//! explanations. This helper strips fences and locates the first balanced
//! JSON object before handing it to the parser.

use serde_json::Value;

use crate::client::LlmError;

/// Extract and parse the first JSON object found in `text`.
///
/// Fence markers are removed, then every `{` is tried as the start of a
/// balanced object (string- and escape-aware) until one parses.
pub fn extract_json_object(text: &str) -> Result<Value, LlmError> {
    let cleaned = strip_fences(text);

    for (start, ch) in cleaned.char_indices() {
        if ch != '{' {
            continue;
        }
        if let Some(end) = find_balanced_end(&cleaned[start..]) {
            let candidate = &cleaned[start..start + end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(LlmError::Parse(preview(text)))
}

/// Remove markdown code-fence lines (```json ... ```)
fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset one past the matching `}` for a slice starting at `{`
fn find_balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= 80 {
        trimmed.to_string()
    } else {
        let mut end = 80;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let v = extract_json_object(r#"{"strategy": "LIGHT_RUSH"}"#).unwrap();
        assert_eq!(v["strategy"], "LIGHT_RUSH");
    }

    #[test]
    fn test_fenced_object() {
        let text = "```json\n{\"a\": 1}\n```";
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_leading_chatter() {
        let text = "Sure! Here is my pick:\n{\"primary_goal\": \"BUILD_ARMY\"} hope that helps";
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["primary_goal"], "BUILD_ARMY");
    }

    #[test]
    fn test_nested_braces_and_strings() {
        let text = r#"note {"outer": {"inner": "has } brace", "n": 2}} tail"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["outer"]["inner"], "has } brace");
        assert_eq!(v["outer"]["n"], 2);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let text = r#"{"msg": "she said \"go\" {now}"}"#;
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["msg"], "she said \"go\" {now}");
    }

    #[test]
    fn test_first_balanced_candidate_that_parses_wins() {
        // The first '{' opens an unparseable fragment; the real object follows
        let text = "{not json} {\"k\": true}";
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["k"], true);
    }

    #[test]
    fn test_no_object_is_parse_error() {
        let err = extract_json_object("no json here at all").unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));

        let err = extract_json_object("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_unterminated_object_is_parse_error() {
        let err = extract_json_object(r#"{"open": "#).unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
