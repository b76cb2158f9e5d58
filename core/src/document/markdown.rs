#![deny(missing_docs)]

//! # Markdown Scanner
//!
//! A line-oriented pass over a markdown file collecting what the extractor
//! needs: headings (with anchors), fenced code blocks (with the metadata
//! comment in front of them) and link references. It is not a full CommonMark
//! parser; setext headings and indented code blocks are not recognised.

use crate::heuristics::slugify_anchor;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// An ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Number of leading `#`.
    pub level: usize,
    /// Heading text.
    pub text: String,
    /// Anchor slug, de-duplicated within the file (`name`, `name-1`, ...).
    pub anchor: String,
    /// One-based line number.
    pub line: usize,
}

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string's first word (`http`, `json`, ...), possibly empty.
    pub language: String,
    /// Block content without the fences.
    pub content: String,
    /// One-based line of the opening fence.
    pub line: usize,
    /// Body of the `<!-- { ... } -->` comment right before the block.
    pub metadata: Option<String>,
    /// Index of the closest preceding heading.
    pub heading: Option<usize>,
    /// False when the file ended before the closing fence.
    pub terminated: bool,
}

/// A link found outside code blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Link text (empty for reference definitions).
    pub text: String,
    /// Link target as written.
    pub target: String,
    /// One-based line number.
    pub line: usize,
}

/// Everything the scanner collects from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownOutline {
    /// Headings in order.
    pub headings: Vec<Heading>,
    /// Fenced blocks in order.
    pub blocks: Vec<CodeBlock>,
    /// Links in order.
    pub links: Vec<LinkRef>,
}

struct OpenFence {
    marker: String,
    language: String,
    line: usize,
    lines: Vec<String>,
    metadata: Option<String>,
}

fn inline_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!?\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
            .expect("Invalid regex")
    })
}

fn reference_def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s{0,3}\[[^\]]+\]:\s*<?(\S+?)>?(\s.*)?$").expect("Invalid regex"))
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").expect("Invalid regex"))
}

/// Scans markdown text.
pub fn scan_markdown(text: &str) -> MarkdownOutline {
    let mut outline = MarkdownOutline::default();
    let mut anchor_counts: HashMap<String, usize> = HashMap::new();
    let mut fence: Option<OpenFence> = None;
    let mut comment: Option<String> = None;
    let mut pending_metadata: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end_matches('\r');

        if let Some(open) = fence.as_mut() {
            let trimmed = line.trim();
            if trimmed.starts_with(&open.marker)
                && trimmed.chars().all(|c| c == open.marker.as_bytes()[0] as char)
            {
                let closed = fence.take();
                if let Some(open) = closed {
                    outline.blocks.push(finish_block(open, &outline.headings, true));
                }
            } else {
                open.lines.push(line.to_string());
            }
            continue;
        }

        if let Some(body) = comment.as_mut() {
            match line.find("-->") {
                Some(end) => {
                    body.push('\n');
                    body.push_str(&line[..end]);
                    let finished = comment.take().unwrap_or_default();
                    pending_metadata = metadata_body(&finished);
                }
                None => {
                    body.push('\n');
                    body.push_str(line);
                }
            }
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(marker) = fence_marker(trimmed) {
            let language = trimmed[marker.len()..]
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string();
            fence = Some(OpenFence {
                marker,
                language,
                line: line_no,
                lines: Vec::new(),
                metadata: pending_metadata.take(),
            });
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("<!--") {
            match rest.find("-->") {
                Some(end) => pending_metadata = metadata_body(&rest[..end]),
                None => comment = Some(rest.to_string()),
            }
            continue;
        }

        pending_metadata = None;

        if let Some((level, text)) = atx_heading(trimmed) {
            let base = slugify_anchor(&text);
            let count = anchor_counts.entry(base.clone()).or_insert(0);
            let anchor = if *count == 0 {
                base
            } else {
                format!("{}-{}", base, count)
            };
            *count += 1;
            outline.headings.push(Heading {
                level,
                text,
                anchor,
                line: line_no,
            });
        }

        collect_links(line, line_no, &mut outline.links);
    }

    if let Some(open) = fence.take() {
        outline.blocks.push(finish_block(open, &outline.headings, false));
    }

    outline
}

fn finish_block(open: OpenFence, headings: &[Heading], terminated: bool) -> CodeBlock {
    CodeBlock {
        language: open.language,
        content: open.lines.join("\n"),
        line: open.line,
        metadata: open.metadata,
        heading: headings.len().checked_sub(1),
        terminated,
    }
}

fn fence_marker(trimmed: &str) -> Option<String> {
    for ch in ['`', '~'] {
        let run = trimmed.chars().take_while(|c| *c == ch).count();
        if run >= 3 {
            return Some(std::iter::repeat(ch).take(run).collect());
        }
    }
    None
}

/// Only comments whose body is a JSON object count as block metadata.
fn metadata_body(body: &str) -> Option<String> {
    let body = body.trim();
    body.starts_with('{').then(|| body.to_string())
}

fn atx_heading(trimmed: &str) -> Option<(usize, String)> {
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim().to_string();
    Some((level, text))
}

fn collect_links(line: &str, line_no: usize, out: &mut Vec<LinkRef>) {
    if let Some(caps) = reference_def_re().captures(line) {
        if let Some(target) = caps.get(1) {
            out.push(LinkRef {
                text: String::new(),
                target: target.as_str().to_string(),
                line: line_no,
            });
        }
        return;
    }
    let without_code = inline_code_re().replace_all(line, "");
    for caps in inline_link_re().captures_iter(&without_code) {
        let text = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let target = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        out.push(LinkRef {
            text: text.to_string(),
            target: target.to_string(),
            line: line_no,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"# Get user

Retrieve a [user](../resources/user.md#properties) object.

## Example

<!-- {
  "blockType": "request",
  "name": "get-user"
} -->
```http
GET https://graph.microsoft.com/v1.0/users/{id}
```

<!-- { "blockType": "response" } -->
```http
HTTP/1.1 200 OK
```

```json
[not](a-link.md)
```

## Example
See `[code](x.md)` and [site](https://example.com "title").

[ref]: other.md#top
"#;

    #[test]
    fn test_headings_and_anchors() {
        let outline = scan_markdown(DOC);
        let anchors: Vec<&str> = outline.headings.iter().map(|h| h.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["get-user", "example", "example-1"]);
        assert_eq!(outline.headings[1].level, 2);
        assert_eq!(outline.headings[0].line, 1);
    }

    #[test]
    fn test_blocks_with_metadata() {
        let outline = scan_markdown(DOC);
        assert_eq!(outline.blocks.len(), 3);

        let request = &outline.blocks[0];
        assert_eq!(request.language, "http");
        assert_eq!(request.line, 11);
        assert!(request.metadata.as_deref().unwrap().contains("get-user"));
        assert_eq!(request.heading, Some(1));
        assert!(request.terminated);

        let response = &outline.blocks[1];
        assert_eq!(response.content, "HTTP/1.1 200 OK");
        assert!(response.metadata.is_some());

        assert!(outline.blocks[2].metadata.is_none());
    }

    #[test]
    fn test_links_skip_code() {
        let outline = scan_markdown(DOC);
        let targets: Vec<&str> = outline.links.iter().map(|l| l.target.as_str()).collect();
        assert_eq!(
            targets,
            vec!["../resources/user.md#properties", "https://example.com", "other.md#top"]
        );
        assert_eq!(outline.links[0].line, 3);
        assert_eq!(outline.links[0].text, "user");
    }

    #[test]
    fn test_prose_between_comment_and_block_drops_metadata() {
        let text = "<!-- { \"blockType\": \"ignored\" } -->\nSome prose.\n```http\nGET /me\n```\n";
        let outline = scan_markdown(text);
        assert_eq!(outline.blocks.len(), 1);
        assert!(outline.blocks[0].metadata.is_none());
    }

    #[test]
    fn test_unterminated_fence() {
        let outline = scan_markdown("```json\n{ \"a\": 1 }\n");
        assert_eq!(outline.blocks.len(), 1);
        assert!(!outline.blocks[0].terminated);
        assert_eq!(outline.blocks[0].content, "{ \"a\": 1 }");
    }

    #[test]
    fn test_hash_without_space_is_not_heading() {
        let outline = scan_markdown("#hashtag\n####### seven\n");
        assert!(outline.headings.is_empty());
    }
}
