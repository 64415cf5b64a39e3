//! Recover the JSON object from a text-model reply.
//!
//! Both text stages are told to answer with one bare JSON object, and both
//! sometimes wrap it in a ```` ```json ```` fence or add a sentence before or
//! after it anyway. Rules, in order:
//!
//! 1. Normalise line endings and strip a BOM
//! 2. If a fenced block is present, keep only its body
//! 3. Keep the span from the first `{` to its matching `}`
//!
//! The result is handed to `serde_json`; schema validation happens there.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\n(.*?)\n[ \t]*```").unwrap());

/// Return the JSON object embedded in `reply`, or None if there is none.
pub fn extract_json_object(reply: &str) -> Option<String> {
    let s = reply.replace("\r\n", "\n").replace('\u{FEFF}', "");
    let body = match RE_FENCED_BLOCK.captures(&s) {
        Some(caps) => caps[1].to_string(),
        None => s,
    };
    balanced_object(&body).map(str::to_string)
}

/// Slice from the first `{` to the brace that closes it, skipping braces
/// inside string literals.
fn balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in s[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object_passthrough() {
        assert_eq!(
            extract_json_object(r#"{"a": 1}"#).as_deref(),
            Some(r#"{"a": 1}"#)
        );
    }

    #[test]
    fn fenced_object() {
        let reply = "Here is the plan:\n```json\n{\"slides\": []}\n```\nGood luck!";
        assert_eq!(
            extract_json_object(reply).as_deref(),
            Some("{\"slides\": []}")
        );
    }

    #[test]
    fn fence_without_language() {
        let reply = "```\r\n{\"x\": true}\r\n```";
        assert_eq!(extract_json_object(reply).as_deref(), Some("{\"x\": true}"));
    }

    #[test]
    fn surrounding_prose_without_fence() {
        let reply = "Sure! {\"a\": {\"b\": 2}} Let me know.";
        assert_eq!(
            extract_json_object(reply).as_deref(),
            Some("{\"a\": {\"b\": 2}}")
        );
    }

    #[test]
    fn braces_inside_strings_ignored() {
        let reply = r#"{"prompt": "a slide with a } brace and \" quote"} trailing"#;
        assert_eq!(
            extract_json_object(reply).as_deref(),
            Some(r#"{"prompt": "a slide with a } brace and \" quote"}"#)
        );
    }

    #[test]
    fn no_object() {
        assert_eq!(extract_json_object("I cannot help with that."), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
        assert_eq!(extract_json_object(""), None);
    }
}
