#![deny(missing_docs)]

//! # Documentation Model
//!
//! - **markdown**: line scanner for headings, fenced blocks and links.
//! - **source**: per-file extraction of methods, resources and annotations.
//! - **set**: loading, parallel extraction and the merged canonical set.

pub mod markdown;
pub mod set;
pub mod source;

pub use markdown::{scan_markdown, CodeBlock, Heading, LinkRef, MarkdownOutline};
pub use set::{DocumentSet, SourceText};
pub use source::{parse_source_file, BlockMetadata, FileId, MethodDefinition, SourceFile};
