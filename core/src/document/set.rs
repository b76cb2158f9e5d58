#![deny(missing_docs)]

//! # Document Set
//!
//! Loads markdown files, extracts them in parallel, then folds resource and
//! annotation fragments through the merge engine into the canonical entity
//! set every checker reads. Built once, read-only afterwards.

use crate::document::source::{parse_source_file, FileId, MethodDefinition, SourceFile};
use crate::error::{AppError, AppResult};
use crate::issues::{IssueKind, SourceLocation, ValidationError};
use crate::merge::{merge, Mergeable};
use crate::schema::{Annotation, ResourceDefinition, ResourceLookup};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw input for one file.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// Path relative to the documentation root, `/`-separated.
    pub display_name: String,
    /// On-disk path, when there is one.
    pub path: Option<PathBuf>,
    /// File contents.
    pub text: String,
}

impl SourceText {
    /// In-memory source without a backing file.
    pub fn new(display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            path: None,
            text: text.into(),
        }
    }
}

/// The parsed and merged documentation.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    root: PathBuf,
    files: Vec<SourceFile>,
    resources: IndexMap<String, ResourceDefinition>,
    annotations: IndexMap<String, Annotation>,
    methods: IndexMap<String, (FileId, usize)>,
}

/// Entities remembering which files contributed to them.
trait Sourced: Mergeable {
    fn sources_mut(&mut self) -> &mut Vec<String>;
}

impl Sourced for ResourceDefinition {
    fn sources_mut(&mut self) -> &mut Vec<String> {
        &mut self.sources
    }
}

impl Sourced for Annotation {
    fn sources_mut(&mut self) -> &mut Vec<String> {
        &mut self.sources
    }
}

impl DocumentSet {
    /// Reads `paths` from disk and builds the set.
    ///
    /// Display names are relative to `root`. An unreadable file is a warning;
    /// failing to read every file is an error.
    pub fn load(root: &Path, paths: &[PathBuf]) -> AppResult<(Self, Vec<ValidationError>)> {
        let mut sorted: Vec<&PathBuf> = paths.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut sources = Vec::with_capacity(sorted.len());
        let mut issues = Vec::new();
        for path in sorted {
            let display_name = display_name(root, path);
            match fs::read_to_string(path) {
                Ok(text) => sources.push(SourceText {
                    display_name,
                    path: Some(path.clone()),
                    text,
                }),
                Err(e) => {
                    warn!(file = %display_name, error = %e, "skipping unreadable file");
                    issues.push(
                        ValidationError::warning(
                            IssueKind::StructuralParseWarning,
                            format!("could not read file: {}", e),
                        )
                        .at(SourceLocation::file(display_name)),
                    );
                }
            }
        }

        let (set, mut load_issues) = Self::from_sources(root, sources)?;
        issues.append(&mut load_issues);
        Ok((set, issues))
    }

    /// Builds the set from in-memory sources.
    pub fn from_sources(
        root: &Path,
        mut sources: Vec<SourceText>,
    ) -> AppResult<(Self, Vec<ValidationError>)> {
        if sources.is_empty() {
            return Err(AppError::General(
                "no documentation files could be loaded".to_string(),
            ));
        }
        sources.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        let files: Vec<SourceFile> = sources
            .into_par_iter()
            .enumerate()
            .map(|(i, s)| parse_source_file(FileId(i), s.display_name, s.path, s.text))
            .collect();

        let mut issues: Vec<ValidationError> =
            files.iter().flat_map(|f| f.issues.iter().cloned()).collect();

        let resources = fold_fragments(
            files.iter().flat_map(|f| f.resources.iter().cloned()),
            &mut issues,
        );
        let annotations = fold_fragments(
            files.iter().flat_map(|f| f.annotations.iter().cloned()),
            &mut issues,
        );

        let mut methods: IndexMap<String, (FileId, usize)> = IndexMap::new();
        for file in &files {
            for (index, method) in file.methods.iter().enumerate() {
                if let Some((first_file, first_index)) = methods.get(&method.name) {
                    let first = &files[first_file.0].methods[*first_index];
                    issues.push(
                        ValidationError::warning(
                            IssueKind::DuplicateMethod,
                            format!(
                                "method '{}' is already defined in {}:{}; keeping the first definition",
                                method.name, files[first_file.0].display_name, first.line
                            ),
                        )
                        .at(SourceLocation::line(file.display_name.clone(), method.line)),
                    );
                    continue;
                }
                methods.insert(method.name.clone(), (file.id, index));
            }
        }

        info!(
            files = files.len(),
            resources = resources.len(),
            annotations = annotations.len(),
            methods = methods.len(),
            "documentation loaded"
        );

        Ok((
            Self {
                root: root.to_path_buf(),
                files,
                resources,
                annotations,
                methods,
            },
            issues,
        ))
    }

    /// Documentation root used for display names and link resolution.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files in load order.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// File by id.
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    /// File by display name.
    pub fn file_by_name(&self, display_name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.display_name == display_name)
    }

    /// Canonical resources, first-documented order.
    pub fn resources(&self) -> &IndexMap<String, ResourceDefinition> {
        &self.resources
    }

    /// Canonical annotations keyed by term.
    pub fn annotations(&self) -> &IndexMap<String, Annotation> {
        &self.annotations
    }

    /// Annotation by term.
    pub fn annotation(&self, term: &str) -> Option<&Annotation> {
        self.annotations.get(term)
    }

    /// Methods in document order, first definition of each name only.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.methods
            .values()
            .filter_map(|(file, index)| self.files.get(file.0)?.methods.get(*index))
    }

    /// Method by display name.
    pub fn method(&self, name: &str) -> Option<&MethodDefinition> {
        let (file, index) = self.methods.get(name)?;
        self.files.get(file.0)?.methods.get(*index)
    }

    /// The file a method was documented in.
    pub fn file_of(&self, method: &MethodDefinition) -> Option<&SourceFile> {
        self.file(method.file)
    }

    /// Declared response schema of a method, if declared and defined.
    pub fn schema_for(&self, method: &MethodDefinition) -> Option<&ResourceDefinition> {
        method
            .response_type
            .as_deref()
            .and_then(|name| self.resources.get(name))
    }
}

impl ResourceLookup for DocumentSet {
    fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }
}

/// Groups fragments by identifier and merges each group.
///
/// Conflicts become Error findings located at the first contributing file;
/// the merged value keeps the union of contributing files.
fn fold_fragments<T: Sourced>(
    fragments: impl Iterator<Item = T>,
    issues: &mut Vec<ValidationError>,
) -> IndexMap<String, T> {
    let mut groups: IndexMap<String, Vec<T>> = IndexMap::new();
    for fragment in fragments {
        groups
            .entry(fragment.identifier().to_string())
            .or_default()
            .push(fragment);
    }

    let mut out = IndexMap::with_capacity(groups.len());
    for (id, mut group) in groups {
        let mut origin: Vec<String> = Vec::new();
        for fragment in &mut group {
            for source in fragment.sources_mut().drain(..) {
                if !origin.contains(&source) {
                    origin.push(source);
                }
            }
        }

        match merge(&group) {
            Ok(merged) => {
                let location = origin.first().map(|f| SourceLocation::file(f.clone()));
                for conflict in merged.conflicts {
                    let mut issue = ValidationError::error(
                        IssueKind::MergeConflict,
                        format!("{} (defined in {})", conflict, origin.join(", ")),
                    );
                    issue.location = location.clone();
                    issues.push(issue);
                }
                let mut value = merged.value;
                *value.sources_mut() = origin;
                debug!(entity = T::ENTITY, %id, fragments = group.len(), "merged");
                out.insert(id, value);
            }
            Err(e) => {
                warn!(entity = T::ENTITY, %id, error = %e, "merge failed");
                issues.push(ValidationError::warning(
                    IssueKind::StructuralParseWarning,
                    e.to_string(),
                ));
            }
        }
    }
    out
}

fn display_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PropertyType, ScalarKind};

    const USER_A: &str = r#"# user

<!-- { "blockType": "resource", "@odata.type": "microsoft.graph.user", "description": "A user." } -->
```json
{ "id": "1", "manager": null }
```
"#;

    const USER_B: &str = r#"# user extras

<!-- { "blockType": "resource", "@odata.type": "microsoft.graph.user", "description": "Someone else." } -->
```json
{ "id": "1", "manager": "bob", "mail": "a@b.c" }
```

# Get user

```http
GET /users/{id}
```

<!-- { "blockType": "response", "@odata.type": "microsoft.graph.user" } -->
```http
HTTP/1.1 200 OK
```
"#;

    const DUPLICATE: &str = "# Get user\n\n```http\nGET /me\n```\n";

    fn set(sources: Vec<SourceText>) -> (DocumentSet, Vec<ValidationError>) {
        DocumentSet::from_sources(Path::new("docs"), sources).unwrap()
    }

    #[test]
    fn test_merges_fragments_across_files() {
        let (set, issues) = set(vec![
            SourceText::new("b.md", USER_B),
            SourceText::new("a.md", USER_A),
        ]);

        let user = set.resource("microsoft.graph.user").unwrap();
        let names: Vec<&str> = user.properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "manager", "mail"]);
        assert_eq!(
            user.property("manager").unwrap().ty,
            PropertyType::Scalar(ScalarKind::String)
        );
        assert!(user.property("manager").unwrap().is_nullable());
        assert_eq!(user.sources, vec!["a.md".to_string(), "b.md".to_string()]);

        // Description disagrees: one conflict, first (a.md) value kept.
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MergeConflict);
        assert_eq!(issues[0].location, Some(SourceLocation::file("a.md")));
        assert_eq!(user.description.as_deref(), Some("A user."));
    }

    #[test]
    fn test_methods_and_schema() {
        let (set, _) = set(vec![SourceText::new("b.md", USER_B)]);
        let method = set.method("Get user").unwrap();
        assert_eq!(set.file_of(method).unwrap().display_name, "b.md");
        assert_eq!(set.schema_for(method).unwrap().name, "microsoft.graph.user");
        assert_eq!(set.methods().count(), 1);
    }

    #[test]
    fn test_duplicate_method_keeps_first() {
        let (set, issues) = set(vec![
            SourceText::new("z.md", DUPLICATE),
            SourceText::new("b.md", USER_B),
        ]);
        assert_eq!(set.methods().count(), 1);
        assert_eq!(set.method("Get user").unwrap().request, "GET /users/{id}");
        let dup: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateMethod)
            .collect();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].location, Some(SourceLocation::line("z.md", 3)));
    }

    #[test]
    fn test_empty_set_is_fatal() {
        assert!(DocumentSet::from_sources(Path::new("."), Vec::new()).is_err());
    }

    #[test]
    fn test_display_name_is_relative() {
        let root = Path::new("docs");
        assert_eq!(display_name(root, &root.join("api").join("user.md")), "api/user.md");
        assert_eq!(display_name(root, Path::new("other.md")), "other.md");
    }
}
