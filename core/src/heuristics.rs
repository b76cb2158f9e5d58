#![deny(missing_docs)]

//! # Heuristics
//!
//! The fuzzy decisions of the extractor, kept as small pure functions so they
//! can be tuned and tested apart from merging and validation:
//!
//! - what a fenced block is (request, response, resource, annotation),
//! - whether a documented value was elided by the author,
//! - how a heading becomes a link anchor.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// What a fenced code block documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// An example HTTP request.
    Request,
    /// An example HTTP response.
    Response,
    /// A JSON example describing a resource shape.
    Resource,
    /// A metadata annotation fragment.
    Annotation,
    /// Anything else.
    Ignored,
}

impl BlockKind {
    /// Parses the `blockType` value of a metadata comment.
    pub fn from_block_type(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "request" => Some(BlockKind::Request),
            "response" => Some(BlockKind::Response),
            "resource" => Some(BlockKind::Resource),
            "annotation" => Some(BlockKind::Annotation),
            "ignored" | "example" => Some(BlockKind::Ignored),
            _ => None,
        }
    }
}

fn request_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|TRACE|CONNECT)\s+[/h{$]\S*")
            .expect("Invalid regex")
    })
}

fn status_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^HTTP/\d(\.\d)?\s+\d{3}(\s.*)?$").expect("Invalid regex"))
}

fn first_meaningful_line(content: &str) -> Option<&str> {
    content.lines().map(str::trim).find(|l| !l.is_empty())
}

/// True if the first non-blank line is an HTTP request line.
pub fn looks_like_request(content: &str) -> bool {
    first_meaningful_line(content).is_some_and(|l| request_line_re().is_match(l))
}

/// True if the first non-blank line is an HTTP status line.
pub fn looks_like_response(content: &str) -> bool {
    first_meaningful_line(content).is_some_and(|l| status_line_re().is_match(l))
}

/// Decides what a fenced block documents.
///
/// An explicit `blockType` wins. Otherwise the leading line decides between
/// request and response; JSON blocks only count as resources when the metadata
/// names a resource type, since bare JSON is usually a fragment of prose.
pub fn classify_block(
    language: &str,
    content: &str,
    declared: Option<BlockKind>,
    names_resource: bool,
) -> BlockKind {
    if let Some(kind) = declared {
        return kind;
    }
    if looks_like_request(content) {
        return BlockKind::Request;
    }
    if looks_like_response(content) {
        return BlockKind::Response;
    }
    let lang = language.trim().to_ascii_lowercase();
    if names_resource && (lang == "json" || lang.is_empty()) {
        return BlockKind::Resource;
    }
    BlockKind::Ignored
}

/// True if a documented value is a placeholder for elided content, e.g.
/// `"..."` or `"value…"`.
pub fn looks_truncated(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let s = s.trim();
            s.ends_with("...") || s.ends_with('…')
        }
        _ => false,
    }
}

/// Removes author elisions that would make a documented JSON body invalid:
/// lines consisting only of `...`/`…` and whole-line `//` comments. Trailing
/// commas left in front of a closing bracket are dropped as well.
pub fn strip_json_elisions(body: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let kept: Vec<&str> = body
        .lines()
        .filter(|line| {
            let t = line.trim().trim_end_matches(',');
            !(t == "..." || t == "…" || t.starts_with("//"))
        })
        .collect();
    let joined = kept.join("\n");
    TRAILING_COMMA
        .get_or_init(|| Regex::new(r",(\s*[}\]])").expect("Invalid regex"))
        .replace_all(&joined, "$1")
        .into_owned()
}

/// Turns heading text into a link anchor: lowercase, ASCII alphanumerics kept,
/// whitespace, `-` and `_` collapse into one `-`, everything else dropped.
pub fn slugify_anchor(text: &str) -> String {
    let mut out = String::new();
    let mut prev_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_dash = false;
        } else if (c.is_whitespace() || c == '-' || c == '_') && !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_by_leading_line() {
        assert_eq!(
            classify_block("http", "GET https://graph.microsoft.com/v1.0/me", None, false),
            BlockKind::Request
        );
        assert_eq!(
            classify_block("", "\nPOST /users HTTP/1.1\nContent-Type: application/json", None, false),
            BlockKind::Request
        );
        assert_eq!(
            classify_block("http", "HTTP/1.1 204 No Content", None, false),
            BlockKind::Response
        );
        assert_eq!(classify_block("json", "{}", None, false), BlockKind::Ignored);
        assert_eq!(classify_block("json", "{}", None, true), BlockKind::Resource);
        assert_eq!(classify_block("rust", "fn main() {}", None, true), BlockKind::Ignored);
    }

    #[test]
    fn test_declared_kind_wins() {
        assert_eq!(
            classify_block("http", "GET /me", Some(BlockKind::Ignored), false),
            BlockKind::Ignored
        );
        assert_eq!(BlockKind::from_block_type(" Response "), Some(BlockKind::Response));
        assert_eq!(BlockKind::from_block_type("table"), None);
    }

    #[test]
    fn test_lowercase_verb_is_not_request() {
        assert!(!looks_like_request("get the user first"));
    }

    #[test]
    fn test_truncation_markers() {
        assert!(looks_truncated(&json!("...")));
        assert!(looks_truncated(&json!("Adele…")));
        assert!(!looks_truncated(&json!("Adele")));
        assert!(!looks_truncated(&json!(3)));
    }

    #[test]
    fn test_strip_json_elisions() {
        let body = "{\n  \"id\": \"1\",\n  ...\n}";
        let cleaned = strip_json_elisions(body);
        let value: Value = serde_json::from_str(&cleaned).unwrap();
        assert_eq!(value, json!({"id": "1"}));
    }

    #[test]
    fn test_slugify_anchor() {
        assert_eq!(slugify_anchor("Get user (beta)"), "get-user-beta");
        assert_eq!(slugify_anchor("  HTTP request / response "), "http-request-response");
        assert_eq!(slugify_anchor("snake_case-Name"), "snake-case-name");
    }
}
