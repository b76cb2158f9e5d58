//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.
//!
//! `AppError` covers operational failures only (unreadable files, malformed
//! scenario configuration, unparsable HTTP text). Findings about the
//! documentation itself are reported as [`crate::issues::ValidationError`].

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[display("JSON Error: {_0}")]
    Json(serde_json::Error),

    /// Wrapper for YAML (de)serialization errors.
    #[display("YAML Error: {_0}")]
    Yaml(serde_yaml::Error),

    /// Raw HTTP text could not be parsed into a message.
    #[from(ignore)]
    #[display("HTTP Parse Error: {_0}")]
    HttpParse(String),

    /// A strict merge met two disagreeing values.
    #[from(ignore)]
    #[display("Merge Conflict: {_0}")]
    MergeConflict(String),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

impl std::error::Error for AppError {}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;
