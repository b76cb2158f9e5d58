#![deny(missing_docs)]

//! # CLI Errors
//!
//! Operational failures of the command line front end. Documentation
//! findings are not errors here; they are rendered and decide the exit code.

use apidoc_core::AppError;
use derive_more::{Display, From};

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// IO Error wrapper.
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// Failure reported by the core library.
    #[display("{}", _0)]
    App(AppError),

    /// Result rendering failed.
    #[display("Output Error: {}", _0)]
    Output(serde_json::Error),

    /// No markdown file was found under the given paths.
    #[from(ignore)]
    #[display("No markdown files found under {}", _0)]
    NoSources(String),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

/// Manual implementation of the standard Error trait.
///
/// `General(String)` carries no source error, so `source()` stays the default.
impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_core_errors() {
        let err: CliError = AppError::General("boom".into()).into();
        assert_eq!(err.to_string(), "General Error: boom");
        let err: CliError = String::from("bad flag").into();
        assert_eq!(err.to_string(), "Operation failed: bad flag");
    }
}
