#![deny(missing_docs)]

//! # HTTP Messages
//!
//! Tolerant parsing of documented request/response text and serialization back
//! to wire text for display. Bodies stay opaque text; JSON bodies are parsed
//! lazily, once, on first access.

use crate::error::{AppError, AppResult};
use crate::heuristics::strip_json_elisions;
use crate::http::headers::{is_json_media_type, HeaderMap};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// View of a message body as JSON.
#[derive(Debug, PartialEq)]
pub enum JsonBody<'a> {
    /// The body is not declared (or sniffed) as JSON.
    NotJson,
    /// The body is empty.
    Empty,
    /// The body parsed.
    Parsed(&'a Value),
    /// The body is declared JSON but does not parse.
    Invalid(&'a str),
}

/// Lazily parsed JSON cache shared by requests and responses.
#[derive(Debug, Clone, Default)]
struct JsonCache(OnceLock<Result<Value, String>>);

impl JsonCache {
    fn view<'a>(&'a self, headers: &HeaderMap, body: &str) -> JsonBody<'a> {
        if body.trim().is_empty() {
            return JsonBody::Empty;
        }
        let declared = match headers.get("content-type") {
            Some(ct) => is_json_media_type(ct),
            None => {
                let t = body.trim_start();
                t.starts_with('{') || t.starts_with('[')
            }
        };
        if !declared {
            return JsonBody::NotJson;
        }
        let parsed = self.0.get_or_init(|| {
            serde_json::from_str::<Value>(body)
                .or_else(|_| serde_json::from_str::<Value>(&strip_json_elisions(body)))
                .map_err(|e| e.to_string())
        });
        match parsed {
            Ok(value) => JsonBody::Parsed(value),
            Err(reason) => JsonBody::Invalid(reason),
        }
    }
}

/// An HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Verb, upper case.
    pub method: String,
    /// Request target as written (path or absolute URL).
    pub target: String,
    /// Protocol version, when the start line carries one.
    pub version: Option<String>,
    /// Headers in line order.
    pub headers: HeaderMap,
    /// Raw body text.
    pub body: String,
    json: JsonCache,
}

impl HttpRequest {
    /// Builds a request programmatically.
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            target: target.into(),
            version: None,
            headers: HeaderMap::new(),
            body: String::new(),
            json: JsonCache::default(),
        }
    }

    /// Builder-style header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Builder-style body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.json = JsonCache::default();
        self
    }

    /// Parses documented request text.
    pub fn parse(text: &str) -> AppResult<Self> {
        let raw = split_message(text)?;
        let mut tokens: Vec<&str> = raw.start_line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(AppError::HttpParse(format!(
                "malformed request line '{}'",
                raw.start_line
            )));
        }
        let method = tokens.remove(0);
        if !method.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::HttpParse(format!("invalid method '{}'", method)));
        }
        // Documented URLs sometimes carry unencoded spaces inside query options.
        let version = match tokens.last() {
            Some(last) if tokens.len() > 1 && last.starts_with("HTTP/") => {
                tokens.pop().map(str::to_string)
            }
            _ => None,
        };
        Ok(Self {
            method: method.to_string(),
            target: tokens.join(" "),
            version,
            headers: raw.headers,
            body: raw.body,
            json: JsonCache::default(),
        })
    }

    /// JSON view of the body.
    pub fn json(&self) -> JsonBody<'_> {
        self.json.view(&self.headers, &self.body)
    }

    /// Serializes to display wire text.
    pub fn to_wire_text(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for HttpRequest {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.target == other.target
            && self.version == other.version
            && self.headers == other.headers
            && self.body == other.body
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => writeln!(f, "{} {} {}", self.method, self.target, v)?,
            None => writeln!(f, "{} {}", self.method, self.target)?,
        }
        write!(f, "{}", self.headers)?;
        if !self.body.is_empty() {
            write!(f, "\n{}", self.body)?;
        }
        Ok(())
    }
}

/// An HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Status code.
    pub status: u16,
    /// Reason phrase (may be empty).
    pub reason: String,
    /// Headers in line order.
    pub headers: HeaderMap,
    /// Raw body text.
    pub body: String,
    json: JsonCache,
}

impl HttpResponse {
    /// Builds a response programmatically.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            reason: reason.into(),
            headers: HeaderMap::new(),
            body: String::new(),
            json: JsonCache::default(),
        }
    }

    /// Builder-style header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Builder-style body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.json = JsonCache::default();
        self
    }

    /// Parses documented (or captured) response text.
    pub fn parse(text: &str) -> AppResult<Self> {
        let raw = split_message(text)?;
        let line = raw.start_line.as_str();
        let (version, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if !version.starts_with("HTTP/") {
            return Err(AppError::HttpParse(format!(
                "malformed status line '{}'",
                raw.start_line
            )));
        }
        let rest = rest.trim_start();
        let (code, reason) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let status = code.parse::<u16>().map_err(|_| {
            AppError::HttpParse(format!("missing status code in '{}'", raw.start_line))
        })?;
        let reason = reason.trim().to_string();
        Ok(Self {
            version: version.to_string(),
            status,
            reason,
            headers: raw.headers,
            body: raw.body,
            json: JsonCache::default(),
        })
    }

    /// JSON view of the body.
    pub fn json(&self) -> JsonBody<'_> {
        self.json.view(&self.headers, &self.body)
    }

    /// Status line without the version, e.g. `200 OK`.
    pub fn status_text(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }

    /// Serializes to display wire text.
    pub fn to_wire_text(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for HttpResponse {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.status == other.status
            && self.reason == other.reason
            && self.headers == other.headers
            && self.body == other.body
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            writeln!(f, "{} {}", self.version, self.status)?;
        } else {
            writeln!(f, "{} {} {}", self.version, self.status, self.reason)?;
        }
        write!(f, "{}", self.headers)?;
        if !self.body.is_empty() {
            write!(f, "\n{}", self.body)?;
        }
        Ok(())
    }
}

struct RawMessage {
    start_line: String,
    headers: HeaderMap,
    body: String,
}

/// Splits text into start line, headers and verbatim body.
///
/// Leading blank lines are skipped. Headers end at the first blank line, or at
/// a line opening a JSON body when the author left out the blank separator.
/// Lines starting with whitespace continue the previous header.
fn split_message(text: &str) -> AppResult<RawMessage> {
    let mut rest = text;
    let start_line = loop {
        let (line, tail) = next_line(rest);
        let Some(line) = line else {
            return Err(AppError::HttpParse("empty message".into()));
        };
        rest = tail;
        let line = line.trim();
        if !line.is_empty() {
            break line.to_string();
        }
    };

    let mut headers = HeaderMap::new();
    let mut pending: Option<(String, String)> = None;
    let body = loop {
        let (line, tail) = next_line(rest);
        let Some(line) = line else {
            break String::new();
        };
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() {
            rest = tail;
            break rest.to_string();
        }
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            break rest.to_string();
        }
        rest = tail;
        if trimmed.starts_with(' ') || trimmed.starts_with('\t') {
            if let Some((_, value)) = pending.as_mut() {
                value.push(' ');
                value.push_str(trimmed.trim());
                continue;
            }
        }
        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(AppError::HttpParse(format!(
                "malformed header line '{}'",
                trimmed
            )));
        };
        if let Some((n, v)) = pending.take() {
            headers.append(n, v);
        }
        pending = Some((name.trim().to_string(), value.trim().to_string()));
    };
    if let Some((n, v)) = pending {
        headers.append(n, v);
    }

    Ok(RawMessage {
        start_line,
        headers,
        body,
    })
}

/// Returns the next line (without `\n`) and the remaining text.
fn next_line(text: &str) -> (Option<&str>, &str) {
    if text.is_empty() {
        return (None, text);
    }
    match text.find('\n') {
        Some(idx) => (Some(&text[..idx]), &text[idx + 1..]),
        None => (Some(text), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESPONSE: &str = "HTTP/1.1 200 OK\ncontent-type: application/json\nETag: \"a\"\n\n{\n  \"id\": \"1\"\n}";

    #[test]
    fn test_parse_response() {
        let resp = HttpResponse::parse(RESPONSE).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(resp.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(resp.body, "{\n  \"id\": \"1\"\n}");
        assert_eq!(resp.json(), JsonBody::Parsed(&json!({"id": "1"})));
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let resp = HttpResponse::parse(RESPONSE).unwrap();
        let wire = resp.to_wire_text();
        assert!(wire.starts_with("HTTP/1.1 200 OK\nContent-Type: application/json\nEtag: \"a\"\n"));
        let again = HttpResponse::parse(&wire).unwrap();
        assert_eq!(again, resp);
        assert_eq!(again.body, resp.body);
    }

    #[test]
    fn test_body_bytes_kept_verbatim_with_crlf() {
        let text = "HTTP/1.1 201 Created\r\nLocation: /x\r\n\r\nline one\r\nline two\r\n";
        let resp = HttpResponse::parse(text).unwrap();
        assert_eq!(resp.body, "line one\r\nline two\r\n");
        assert_eq!(resp.headers.get("location"), Some("/x"));
        assert_eq!(resp.json(), JsonBody::NotJson);
    }

    #[test]
    fn test_status_without_reason() {
        let resp = HttpResponse::parse("HTTP/1.1 204").unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(resp.status_text(), "204");
        assert_eq!(resp.json(), JsonBody::Empty);
    }

    #[test]
    fn test_parse_request_without_blank_separator() {
        let text = "\nPOST https://graph.microsoft.com/v1.0/users\nContent-type: application/json\n{\n  \"displayName\": \"A\"\n}";
        let req = HttpRequest::parse(text).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.target, "https://graph.microsoft.com/v1.0/users");
        assert_eq!(req.version, None);
        assert_eq!(req.json(), JsonBody::Parsed(&json!({"displayName": "A"})));
    }

    #[test]
    fn test_request_target_with_spaces() {
        let req = HttpRequest::parse("GET /users?$search=\"display name\" HTTP/1.1").unwrap();
        assert_eq!(req.target, "/users?$search=\"display name\"");
        assert_eq!(req.version.as_deref(), Some("HTTP/1.1"));
    }

    #[test]
    fn test_header_continuation_lines() {
        let text = "GET /me HTTP/1.1\nPrefer: a\n  b\nHost: x\n";
        let req = HttpRequest::parse(text).unwrap();
        assert_eq!(req.headers.get("prefer"), Some("a b"));
        assert_eq!(req.version.as_deref(), Some("HTTP/1.1"));
    }

    #[test]
    fn test_invalid_json_reported() {
        let resp = HttpResponse::new(200, "OK")
            .with_header("Content-Type", "application/json")
            .with_body("{ nope");
        assert!(matches!(resp.json(), JsonBody::Invalid(_)));
    }

    #[test]
    fn test_malformed_messages() {
        assert!(HttpResponse::parse("").is_err());
        assert!(HttpResponse::parse("OK 200").is_err());
        assert!(HttpRequest::parse("get /me").is_err());
        assert!(HttpRequest::parse("GET /me\nnot a header\n").is_err());
    }
}
