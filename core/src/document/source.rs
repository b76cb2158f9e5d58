#![deny(missing_docs)]

//! # Source Files
//!
//! Per-file extraction: turns one markdown file into methods, resource
//! fragments, annotation fragments, anchors and links. Problems with single
//! blocks become warnings on the file; extraction itself never fails.

use crate::document::markdown::{scan_markdown, CodeBlock, Heading, LinkRef};
use crate::heuristics::{classify_block, slugify_anchor, strip_json_elisions, BlockKind};
use crate::issues::{IssueKind, SourceLocation, ValidationError};
use crate::schema::{infer_resources, parse_annotation, Annotation, InferenceHints, ResourceDefinition};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use tracing::debug;

/// Index of a file inside its [`crate::document::DocumentSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// A documented API operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// Display name; never empty.
    pub name: String,
    /// Owning file (non-owning back-reference).
    pub file: FileId,
    /// Line of the request block.
    pub line: usize,
    /// Raw documented request text.
    pub request: String,
    /// Raw documented expected-response text.
    pub expected_response: Option<String>,
    /// Declared response resource type.
    pub response_type: Option<String>,
    /// The response body is a collection of `response_type`.
    pub is_collection: bool,
    /// The documented response example is abbreviated.
    pub truncated: bool,
    /// The documented response is an error example.
    pub expect_error: bool,
}

/// Metadata comment placed in front of a fenced block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockMetadata {
    /// `request`, `response`, `resource`, `annotation` or `ignored`.
    pub block_type: Option<String>,
    /// Method name (requests) or method the response belongs to.
    pub name: Option<String>,
    /// Resource type name.
    #[serde(rename = "@odata.type")]
    pub odata_type: Option<String>,
    /// Abbreviated example.
    pub truncated: bool,
    /// Response body is a collection.
    pub is_collection: bool,
    /// Properties responses may omit.
    pub optional_properties: Vec<String>,
    /// Properties documented as nullable.
    pub nullable_properties: Vec<String>,
    /// Key property of a resource.
    pub key_property: Option<String>,
    /// Resource description.
    pub description: Option<String>,
    /// Response documents an error.
    pub expect_error: bool,
}

/// One parsed markdown file. Immutable after extraction.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Position in the owning set.
    pub id: FileId,
    /// Path relative to the documentation root, `/`-separated.
    pub display_name: String,
    /// On-disk path, when loaded from disk.
    pub path: Option<PathBuf>,
    /// Raw text.
    pub text: String,
    /// Headings in order.
    pub headings: Vec<Heading>,
    /// Anchor slugs of all headings.
    pub anchors: BTreeSet<String>,
    /// Links in order.
    pub links: Vec<LinkRef>,
    /// Resource fragments (not yet merged).
    pub resources: Vec<ResourceDefinition>,
    /// Annotation fragments (not yet merged).
    pub annotations: Vec<Annotation>,
    /// Methods in document order.
    pub methods: Vec<MethodDefinition>,
    /// Extraction warnings.
    pub issues: Vec<ValidationError>,
}

impl SourceFile {
    /// True if the file defines a heading with this anchor. The link side is
    /// slugified like headings are, so case and punctuation do not matter.
    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.anchors.contains(&anchor.to_ascii_lowercase())
            || self.anchors.contains(&slugify_anchor(anchor))
    }

    fn location(&self, line: usize) -> SourceLocation {
        SourceLocation::line(self.display_name.clone(), line)
    }

    fn warn(&mut self, kind: IssueKind, line: usize, message: String) {
        let issue = ValidationError::warning(kind, message).at(self.location(line));
        debug!(%issue, "extraction warning");
        self.issues.push(issue);
    }
}

/// Parses one markdown file.
pub fn parse_source_file(
    id: FileId,
    display_name: impl Into<String>,
    path: Option<PathBuf>,
    text: String,
) -> SourceFile {
    let outline = scan_markdown(&text);
    let mut file = SourceFile {
        id,
        display_name: display_name.into(),
        path,
        anchors: outline.headings.iter().map(|h| h.anchor.clone()).collect(),
        headings: outline.headings,
        links: outline.links,
        text: String::new(),
        resources: Vec::new(),
        annotations: Vec::new(),
        methods: Vec::new(),
        issues: Vec::new(),
    };

    let mut extractor = Extractor::default();
    for block in &outline.blocks {
        extractor.block(&mut file, block);
    }
    file.text = text;
    file
}

#[derive(Default)]
struct Extractor {
    open_request: Option<usize>,
    used_names: HashSet<String>,
}

impl Extractor {
    fn block(&mut self, file: &mut SourceFile, block: &CodeBlock) {
        if !block.terminated {
            file.warn(
                IssueKind::StructuralParseWarning,
                block.line,
                "code block is not closed before the end of the file".into(),
            );
        }

        let metadata = match block.metadata.as_deref() {
            Some(raw) => match serde_json::from_str::<BlockMetadata>(raw) {
                Ok(meta) => meta,
                Err(e) => {
                    file.warn(
                        IssueKind::StructuralParseWarning,
                        block.line,
                        format!("ignoring malformed metadata comment: {}", e),
                    );
                    BlockMetadata::default()
                }
            },
            None => BlockMetadata::default(),
        };

        let declared = match metadata.block_type.as_deref() {
            Some(raw) => {
                let kind = BlockKind::from_block_type(raw);
                if kind.is_none() {
                    file.warn(
                        IssueKind::StructuralParseWarning,
                        block.line,
                        format!("unknown blockType '{}'", raw),
                    );
                }
                kind
            }
            None => None,
        };

        let kind = classify_block(
            &block.language,
            &block.content,
            declared,
            metadata.odata_type.is_some(),
        );
        match kind {
            BlockKind::Request => self.request(file, block, &metadata),
            BlockKind::Response => self.response(file, block, &metadata),
            BlockKind::Resource => resource(file, block, &metadata),
            BlockKind::Annotation => match parse_annotation(&block.content) {
                Ok(mut annotation) => {
                    annotation.sources.push(file.display_name.clone());
                    file.annotations.push(annotation);
                }
                Err(e) => file.warn(
                    IssueKind::StructuralParseWarning,
                    block.line,
                    format!("skipping malformed annotation block: {}", e),
                ),
            },
            BlockKind::Ignored => {}
        }
    }

    fn request(&mut self, file: &mut SourceFile, block: &CodeBlock, meta: &BlockMetadata) {
        let name = match meta.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => self.derived_name(file, block),
        };
        self.used_names.insert(name.clone());
        file.methods.push(MethodDefinition {
            name,
            file: file.id,
            line: block.line,
            request: block.content.clone(),
            expected_response: None,
            response_type: None,
            is_collection: false,
            truncated: false,
            expect_error: false,
        });
        self.open_request = Some(file.methods.len() - 1);
    }

    /// Heading text, made unique within the file, else `<stem>-<n>`.
    fn derived_name(&self, file: &SourceFile, block: &CodeBlock) -> String {
        let stem = file
            .display_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(".md");
        let base = block
            .heading
            .and_then(|i| file.headings.get(i))
            .map(|h| h.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("{}-{}", stem, file.methods.len() + 1));
        if !self.used_names.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !self.used_names.contains(candidate))
            .unwrap_or(base)
    }

    fn response(&mut self, file: &mut SourceFile, block: &CodeBlock, meta: &BlockMetadata) {
        let by_name = meta.name.as_deref().and_then(|name| {
            file.methods
                .iter()
                .position(|m| m.name == name && m.expected_response.is_none())
        });
        let Some(index) = by_name.or(self.open_request) else {
            file.warn(
                IssueKind::OrphanResponse,
                block.line,
                "response example has no preceding request".into(),
            );
            return;
        };
        if self.open_request == Some(index) {
            self.open_request = None;
        }
        let method = &mut file.methods[index];
        method.expected_response = Some(block.content.clone());
        method.response_type = meta
            .odata_type
            .as_deref()
            .map(|t| t.trim_start_matches('#').to_string());
        method.is_collection = meta.is_collection;
        method.truncated = meta.truncated;
        method.expect_error = meta.expect_error;
    }
}

fn resource(file: &mut SourceFile, block: &CodeBlock, meta: &BlockMetadata) {
    let Some(name) = meta
        .odata_type
        .as_deref()
        .or(meta.name.as_deref())
        .map(|n| n.trim_start_matches('#').to_string())
    else {
        file.warn(
            IssueKind::StructuralParseWarning,
            block.line,
            "resource block does not name its type (@odata.type)".into(),
        );
        return;
    };

    let value: Value = match serde_json::from_str(&block.content)
        .or_else(|_| serde_json::from_str(&strip_json_elisions(&block.content)))
    {
        Ok(v) => v,
        Err(e) => {
            file.warn(
                IssueKind::StructuralParseWarning,
                block.line,
                format!("skipping resource '{}': invalid JSON: {}", name, e),
            );
            return;
        }
    };

    let hints = InferenceHints {
        optional_properties: meta.optional_properties.clone(),
        nullable_properties: meta.nullable_properties.clone(),
        key_property: meta.key_property.clone(),
        description: meta.description.clone(),
    };
    match infer_resources(&name, &value, &hints) {
        Ok(defs) => {
            for mut def in defs {
                def.sources.push(file.display_name.clone());
                file.resources.push(def);
            }
        }
        Err(e) => file.warn(
            IssueKind::StructuralParseWarning,
            block.line,
            format!("skipping resource '{}': {}", name, e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_MD: &str = r##"# user resource type

<!-- { "blockType": "resource", "@odata.type": "microsoft.graph.user", "optionalProperties": ["manager"], "keyProperty": "id" } -->
```json
{
  "id": "string",
  "displayName": "string",
  "manager": { "@odata.type": "microsoft.graph.directoryObject" },
  ...
}
```

# Get user

```http
GET /users/{id}
```

<!-- { "blockType": "response", "@odata.type": "#microsoft.graph.user", "truncated": true } -->
```http
HTTP/1.1 200 OK
Content-Type: application/json

{ "id": "1" }
```

# Get user

```http
GET /me
```

<!-- { "blockType": "annotation" } -->
```json
{ "term": "Org.OData.Core.V1.Description", "target": "user" }
```

<!-- { "blockType": "response", "name": "nope" -->
```http
HTTP/1.1 204 No Content
```
"##;

    fn parse(text: &str) -> SourceFile {
        parse_source_file(FileId(0), "api/user.md", None, text.to_string())
    }

    #[test]
    fn test_extracts_resources() {
        let file = parse(USER_MD);
        let names: Vec<&str> = file.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["microsoft.graph.user", "microsoft.graph.directoryObject"]);
        let user = &file.resources[0];
        assert_eq!(user.key_property.as_deref(), Some("id"));
        assert!(user.property("manager").unwrap().is_truncatable());
        assert_eq!(user.sources, vec!["api/user.md".to_string()]);
    }

    #[test]
    fn test_pairs_methods_and_names_from_headings() {
        let file = parse(USER_MD);
        assert_eq!(file.methods.len(), 2);

        let first = &file.methods[0];
        assert_eq!(first.name, "Get user");
        assert_eq!(first.response_type.as_deref(), Some("microsoft.graph.user"));
        assert!(first.truncated);
        assert!(first.expected_response.as_deref().unwrap().starts_with("HTTP/1.1 200 OK"));

        let second = &file.methods[1];
        assert_eq!(second.name, "Get user-2");
        assert_eq!(second.file, FileId(0));
    }

    #[test]
    fn test_annotation_and_warnings() {
        let file = parse(USER_MD);
        assert_eq!(file.annotations.len(), 1);
        assert_eq!(file.annotations[0].sources, vec!["api/user.md".to_string()]);

        // The last response has a malformed comment and falls back to the heuristic,
        // pairing with the still-open `GET /me` request.
        assert_eq!(file.issues.len(), 1);
        assert_eq!(file.issues[0].kind, IssueKind::StructuralParseWarning);
        assert_eq!(
            file.methods[1].expected_response.as_deref(),
            Some("HTTP/1.1 204 No Content")
        );
    }

    #[test]
    fn test_orphan_response() {
        let file = parse("```http\nHTTP/1.1 200 OK\n```\n");
        assert_eq!(file.issues.len(), 1);
        assert_eq!(file.issues[0].kind, IssueKind::OrphanResponse);
        assert_eq!(file.issues[0].location, Some(SourceLocation::line("api/user.md", 1)));
    }

    #[test]
    fn test_fallback_name_without_heading() {
        let file = parse("```http\nDELETE /users/1\n```\n");
        assert_eq!(file.methods[0].name, "user-1");
        assert!(!file.has_anchor("missing"));
    }

    #[test]
    fn test_invalid_resource_json_is_skipped() {
        let text = "<!-- { \"blockType\": \"resource\", \"@odata.type\": \"x\" } -->\n```json\n{ nope\n```\n";
        let file = parse(text);
        assert!(file.resources.is_empty());
        assert_eq!(file.issues.len(), 1);
        assert!(file.issues[0].message.contains("invalid JSON"));
    }
}
