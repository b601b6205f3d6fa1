//! Text from JSON documents (API responses, embedded article payloads)

use crate::extract::text::{element_lines, Line};
use scraper::Html;
use serde_json::{Map, Value};

/// Keys whose string values are titles
const TITLE_KEYS: &[&str] = &["title", "headline", "name", "subject"];

/// Keys whose string values are body text
const BODY_KEYS: &[&str] = &[
    "body",
    "content",
    "text",
    "articlebody",
    "article_body",
    "description",
    "summary",
    "excerpt",
    "html",
];

const MAX_DEPTH: usize = 16;

/// Parses `body` as JSON, if it is a JSON object or array
pub fn parse_json_document(body: &str) -> Option<Value> {
    let trimmed = body.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Turns a JSON document into lines: title fields become heading lines,
/// body fields become body lines. Documents without recognized keys fall
/// back to every string leaf of at least `min_leaf_chars` characters.
pub fn json_lines(value: &Value, min_leaf_chars: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    collect_known_fields(value, &mut lines, 0);

    if lines.is_empty() {
        collect_string_leaves(value, min_leaf_chars, &mut lines, 0);
    }
    lines
}

fn collect_known_fields(value: &Value, lines: &mut Vec<Line>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => {
            for (key, text) in string_fields(map, TITLE_KEYS) {
                tracing::trace!("JSON title field '{}'", key);
                lines.push(Line::heading(text));
            }
            for (_, text) in string_fields(map, BODY_KEYS) {
                lines.extend(text_lines(text));
            }
            for nested in map.values().filter(|v| v.is_object() || v.is_array()) {
                collect_known_fields(nested, lines, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_known_fields(item, lines, depth + 1);
            }
        }
        _ => {}
    }
}

/// String values of `map` whose lower-cased key is in `keys`, in `keys` order
fn string_fields<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Vec<(&'a str, &'a str)> {
    keys.iter()
        .flat_map(|wanted| {
            map.iter().filter_map(move |(key, value)| match value {
                Value::String(text) if key.to_lowercase() == *wanted => {
                    Some((key.as_str(), text.as_str()))
                }
                _ => None,
            })
        })
        .collect()
}

/// Body text may itself be markup; otherwise it is split on newlines
fn text_lines(text: &str) -> Vec<Line> {
    if text.contains('<') && text.contains('>') {
        let fragment = Html::parse_fragment(text);
        return element_lines(fragment.root_element());
    }
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(Line::body)
        .collect()
}

fn collect_string_leaves(value: &Value, min_chars: usize, lines: &mut Vec<Line>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::String(text) if text.chars().count() >= min_chars => {
            lines.extend(text_lines(text));
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_string_leaves(nested, min_chars, lines, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_string_leaves(item, min_chars, lines, depth + 1);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_document_requires_object_or_array() {
        assert!(parse_json_document(r#"  {"a": 1}"#).is_some());
        assert!(parse_json_document("[1, 2]").is_some());
        assert!(parse_json_document("\"just a string\"").is_none());
        assert!(parse_json_document("<html></html>").is_none());
        assert!(parse_json_document("{ not json").is_none());
    }

    #[test]
    fn test_title_precedes_body() {
        let value = json!({"body": "The body text", "title": "T"});
        let lines = json_lines(&value, 10);
        assert_eq!(lines, vec![Line::heading("T"), Line::body("The body text")]);
    }

    #[test]
    fn test_nested_and_html_bodies() {
        let value = json!({
            "data": {
                "article": {
                    "Headline": "Nested",
                    "content": "<p>First paragraph</p><p>Second paragraph</p>"
                }
            }
        });
        let lines = json_lines(&value, 10);
        assert_eq!(
            lines,
            vec![
                Line::heading("Nested"),
                Line::body("First paragraph"),
                Line::body("Second paragraph"),
            ]
        );
    }

    #[test]
    fn test_unknown_keys_fall_back_to_long_leaves() {
        let value = json!({"x": "short", "y": ["a sufficiently long string value"], "n": 5});
        let lines = json_lines(&value, 10);
        assert_eq!(lines, vec![Line::body("a sufficiently long string value")]);
    }
}
