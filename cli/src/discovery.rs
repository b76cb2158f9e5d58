#![deny(missing_docs)]

//! # Source Discovery
//!
//! Expands command line paths into the markdown files to load and the
//! documentation root their display names are relative to.

use crate::error::{CliError, CliResult};
use apidoc_core::{DocumentSet, ValidationError};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Shared arguments naming the documentation to load.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Markdown files or directories (searched recursively for `*.md`).
    #[clap(required = true)]
    pub paths: Vec<PathBuf>,

    /// Documentation root used for display names and links.
    /// Defaults to the deepest directory containing every path.
    #[clap(long)]
    pub root: Option<PathBuf>,
}

impl SourceArgs {
    /// Walks the paths and loads the document set.
    pub fn load(&self) -> CliResult<(DocumentSet, Vec<ValidationError>)> {
        let files = markdown_files(&self.paths);
        if files.is_empty() {
            return Err(CliError::NoSources(describe(&self.paths)));
        }
        let root = match &self.root {
            Some(root) => root.clone(),
            None => common_root(&self.paths),
        };
        debug!(root = %root.display(), files = files.len(), "sources discovered");
        Ok(DocumentSet::load(&root, &files)?)
    }
}

/// Every `*.md` file under `paths`, sorted. Plain file arguments are kept
/// whatever their extension.
pub fn markdown_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_file() {
            out.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let candidate = entry.path();
            if entry.file_type().is_file()
                && candidate
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
            {
                out.push(candidate.to_path_buf());
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Deepest directory that contains every path.
pub fn common_root(paths: &[PathBuf]) -> PathBuf {
    let dirs: Vec<&Path> = paths
        .iter()
        .map(|p| {
            if p.is_dir() {
                p.as_path()
            } else {
                p.parent().unwrap_or_else(|| Path::new(""))
            }
        })
        .collect();
    let Some((first, rest)) = dirs.split_first() else {
        return PathBuf::from(".");
    };
    let mut root: PathBuf = first.to_path_buf();
    for dir in rest {
        while !dir.starts_with(&root) {
            if !root.pop() {
                break;
            }
        }
    }
    root
}

fn describe(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_finds_markdown_recursively() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("api/v1")).unwrap();
        fs::write(dir.path().join("index.md"), "# Index").unwrap();
        fs::write(dir.path().join("api/v1/user.MD"), "# User").unwrap();
        fs::write(dir.path().join("api/notes.txt"), "skip").unwrap();

        let files = markdown_files(&[dir.path().to_path_buf()]);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some()));
    }

    #[test]
    fn test_common_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join("a/c")).unwrap();
        fs::write(dir.path().join("a/c/x.md"), "").unwrap();

        let root = common_root(&[dir.path().join("a/b"), dir.path().join("a/c/x.md")]);
        assert_eq!(root, dir.path().join("a"));
    }

    #[test]
    fn test_no_sources_is_an_error() {
        let dir = tempdir().unwrap();
        let args = SourceArgs {
            paths: vec![dir.path().to_path_buf()],
            root: None,
        };
        assert!(matches!(args.load(), Err(CliError::NoSources(_))));
    }
}
