#![deny(missing_docs)]

//! # Check Links Command
//!
//! Loads the documentation and resolves every link against the loaded files
//! and their heading anchors.

use crate::discovery::SourceArgs;
use crate::error::CliResult;
use crate::report::{render, OutputFormat};
use apidoc_core::{check_links, Summary};

/// Arguments for the check-links command.
#[derive(clap::Args, Debug, Clone)]
pub struct CheckLinksArgs {
    /// Documentation to load.
    #[clap(flatten)]
    pub sources: SourceArgs,
}

/// Executes the link check. Each file counts as one checked unit.
pub fn execute(args: &CheckLinksArgs, format: OutputFormat) -> CliResult<Summary> {
    let (set, load_issues) = args.sources.load()?;
    let issues = check_links(&set);

    let mut summary = Summary::default();
    summary.record_issues(&load_issues);
    for file in set.files() {
        let own: Vec<_> = issues
            .iter()
            .filter(|i| i.location.as_ref().is_some_and(|l| l.file == file.display_name))
            .cloned()
            .collect();
        summary.record_unit(&own);
    }

    let mut all = load_issues;
    all.extend(issues);
    print!("{}", render(format, "check-links", &all, &[], &summary)?);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_broken_and_asset_links() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/logo.png"), [0u8; 4]).unwrap();
        fs::write(
            dir.path().join("index.md"),
            "# Index\n\n![logo](images/logo.png)\n[gone](missing.md)\n[self](#index)\n",
        )
        .unwrap();

        let args = CheckLinksArgs {
            sources: SourceArgs {
                paths: vec![dir.path().to_path_buf()],
                root: None,
            },
        };
        let summary = execute(&args, OutputFormat::Json).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failed, 1);
    }
}
