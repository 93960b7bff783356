//! Parsing of model payloads: `### Header ###` sections and embedded JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"###\s*([^#\n]+?)\s*###").expect("valid regex"));

static FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").expect("valid regex"));

/// Text of the last `### header ###` section, up to the next header.
///
/// Header names compare case-insensitively. Returns `None` when the header
/// is absent.
pub fn section(response: &str, header: &str) -> Option<String> {
    let headers: Vec<_> = HEADER_RE.captures_iter(response).collect();
    let position = headers
        .iter()
        .rposition(|caps| caps[1].trim().eq_ignore_ascii_case(header.trim()))?;

    let start = headers[position].get(0)?.end();
    let end = headers
        .get(position + 1)
        .and_then(|caps| caps.get(0))
        .map(|m| m.start())
        .unwrap_or(response.len());

    Some(response[start..end].trim().to_string())
}

/// Like [`section`], with all whitespace runs collapsed to single spaces.
pub fn section_line(response: &str, header: &str) -> Option<String> {
    section(response, header).map(|text| collapse_whitespace(&text))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove code fences plus `//` and `#` comments that sit outside string literals.
pub fn strip_comments(text: &str) -> String {
    let text = FENCE_RE.replace_all(text, "");
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
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

        let starts_comment = c == '#' || (c == '/' && chars.peek() == Some(&'/'));
        if starts_comment {
            for skipped in chars.by_ref() {
                if skipped == '\n' {
                    out.push('\n');
                    break;
                }
            }
            continue;
        }

        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// The first JSON value opening with `open` (`{` or `[`) that parses as `T`.
pub fn extract_json<T: DeserializeOwned>(text: &str, open: char) -> Option<T> {
    let cleaned = strip_comments(text);
    for (offset, _) in cleaned.match_indices(open) {
        let mut stream = serde_json::Deserializer::from_str(&cleaned[offset..]).into_iter::<T>();
        if let Some(Ok(value)) = stream.next() {
            return Some(value);
        }
    }
    None
}

/// The first JSON object in a model response.
pub fn extract_json_object(text: &str) -> Option<Value> {
    extract_json::<Value>(text, '{').filter(Value::is_object)
}

/// Whether a payload is the literal "None" answer.
pub fn is_none_answer(text: &str) -> bool {
    let trimmed = text.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`');
    trimmed.eq_ignore_ascii_case("none")
}
