#![deny(missing_docs)]

//! # Link Checker
//!
//! Resolves every link collected during extraction against the loaded files,
//! their heading anchors and, for assets that are not markdown, the file
//! system under the documentation root. Absolute URLs are checked for syntax
//! only.

use crate::document::{DocumentSet, LinkRef, SourceFile};
use crate::issues::{IssueKind, SourceLocation, ValidationError};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("Invalid regex"))
}

/// Checks every link in the set.
pub fn check_links(set: &DocumentSet) -> Vec<ValidationError> {
    let mut out = Vec::new();
    let mut checked = 0usize;
    for file in set.files() {
        for link in &file.links {
            checked += 1;
            if let Some(issue) = check_link(set, file, link) {
                out.push(issue.at(SourceLocation::line(file.display_name.clone(), link.line)));
            }
        }
    }
    debug!(links = checked, problems = out.len(), "links checked");
    out
}

fn check_link(set: &DocumentSet, file: &SourceFile, link: &LinkRef) -> Option<ValidationError> {
    let target = link.target.trim();
    if target.is_empty() {
        return None;
    }

    if let Some(anchor) = target.strip_prefix('#') {
        let anchor = decode(anchor);
        return (!file.has_anchor(&anchor)).then(|| {
            ValidationError::error(
                IssueKind::UnresolvedReference,
                format!("anchor '#{}' does not match any heading in this file", anchor),
            )
        });
    }

    if let Some(scheme) = scheme_re().captures(target).and_then(|c| c.get(1)) {
        return check_url(target, &scheme.as_str().to_ascii_lowercase());
    }
    if target.starts_with("//") {
        return check_url(&format!("https:{}", target), "https");
    }

    let (path, anchor) = match target.split_once('#') {
        Some((path, anchor)) => (path, Some(decode(anchor))),
        None => (target, None),
    };
    let path = path.split('?').next().unwrap_or_default();
    let Some(resolved) = resolve_relative(&file.display_name, &decode(path)) else {
        return Some(ValidationError::error(
            IssueKind::UnresolvedReference,
            format!("link '{}' points outside the documentation root", target),
        ));
    };

    match set.file_by_name(&resolved) {
        Some(linked) => match anchor {
            Some(anchor) if !anchor.is_empty() && !linked.has_anchor(&anchor) => {
                Some(ValidationError::error(
                    IssueKind::UnresolvedReference,
                    format!("anchor '#{}' does not match any heading in '{}'", anchor, resolved),
                ))
            }
            _ => None,
        },
        None if !resolved.is_empty() && set.root().join(&resolved).exists() => None,
        None => Some(ValidationError::error(
            IssueKind::UnresolvedReference,
            format!("link '{}' points to a missing file '{}'", target, resolved),
        )),
    }
}

fn check_url(target: &str, scheme: &str) -> Option<ValidationError> {
    let suspicious = |reason: String| {
        Some(ValidationError::warning(
            IssueKind::SuspiciousUrl,
            format!("URL '{}' looks malformed: {}", target, reason),
        ))
    };
    match scheme {
        "mailto" => {
            if target.contains('@') {
                None
            } else {
                suspicious("no address".to_string())
            }
        }
        "http" | "https" if target.chars().any(char::is_whitespace) => {
            suspicious("contains whitespace".to_string())
        }
        "http" | "https" => match Url::parse(target) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => None,
            Ok(_) => suspicious("no host".to_string()),
            Err(e) => suspicious(e.to_string()),
        },
        other => suspicious(format!("unsupported scheme '{}'", other)),
    }
}

fn decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

/// Resolves `target` relative to the directory of `from`, both `/`-separated.
/// `None` when `..` climbs above the root.
fn resolve_relative(from: &str, target: &str) -> Option<String> {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = from.split('/').collect();
        dir.pop();
        dir
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceText;
    use std::path::Path;

    fn check(sources: Vec<SourceText>) -> Vec<ValidationError> {
        let (set, _) = DocumentSet::from_sources(Path::new("/nonexistent-docs-root"), sources).unwrap();
        check_links(&set)
    }

    fn target_file() -> SourceText {
        SourceText::new("api/user.md", "# User\n\n## Properties\n")
    }

    #[test]
    fn test_missing_file_is_one_error() {
        let issues = check(vec![
            SourceText::new("index.md", "See [users](api/missing.md).\n"),
            target_file(),
        ]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(issues[0].kind, IssueKind::UnresolvedReference);
        assert_eq!(issues[0].location, Some(SourceLocation::line("index.md", 1)));
    }

    #[test]
    fn test_wrong_anchor_is_one_error() {
        let issues = check(vec![
            SourceText::new("index.md", "See [users](api/user.md#relationships).\n"),
            target_file(),
        ]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("#relationships"));
    }

    #[test]
    fn test_matching_anchor_resolves() {
        let issues = check(vec![
            SourceText::new(
                "guide/index.md",
                "See [users](../api/user.md#Properties) and [top](#intro).\n\n# Intro\n",
            ),
            target_file(),
        ]);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_same_file_anchor() {
        let issues = check(vec![SourceText::new("a.md", "# One\n[x](#two)\n")]);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_anchor_matching_ignores_case_and_punctuation() {
        let issues = check(vec![SourceText::new(
            "a.md",
            "## user_id field\n\n## What's new?\n\nSee [x](#user_id-field), [y](#Whats-New) and [z](#what's-new%3F).\n",
        )]);
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_urls() {
        let issues = check(vec![SourceText::new(
            "a.md",
            "[ok](https://example.com/a%20b) [mail](mailto:me@example.com) [bad](http://) [ftp](ftp://x) [nomail](mailto:someone)\n",
        )]);
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::SuspiciousUrl; 3]);
        assert!(issues.iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("a/b/c.md", "../d.md").as_deref(), Some("a/d.md"));
        assert_eq!(resolve_relative("a/c.md", "./x/%20.md").as_deref(), Some("a/x/%20.md"));
        assert_eq!(resolve_relative("c.md", "/abs/x.md").as_deref(), Some("abs/x.md"));
        assert_eq!(resolve_relative("c.md", "../x.md"), None);
    }

    #[test]
    fn test_percent_encoded_paths() {
        let issues = check(vec![
            SourceText::new("index.md", "[x](my%20page.md)\n"),
            SourceText::new("my page.md", "# Hi\n"),
        ]);
        assert!(issues.is_empty());
    }
}
