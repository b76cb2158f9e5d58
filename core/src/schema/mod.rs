#![deny(missing_docs)]

//! # Resource Schema Model
//!
//! - **resource**: resource types, properties and their merge tables.
//! - **annotation**: metadata annotation fragments keyed by term.
//! - **infer**: structural inference from documented JSON examples.

pub mod annotation;
pub mod infer;
pub mod resource;

pub use annotation::{parse_annotation, Annotation, AnnotationRecord};
pub use infer::{infer_resources, kind_name, InferenceHints};
pub use resource::{
    Property, PropertyType, ResourceDefinition, ResourceLookup, ScalarKind,
};
