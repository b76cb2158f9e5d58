#![deny(missing_docs)]

//! # HTTP Message Model
//!
//! - **headers**: ordered, case-insensitive header map and media type helpers.
//! - **message**: request/response parsing, lazy JSON bodies, wire text.

pub mod headers;
pub mod message;

pub use headers::{canonical_name, is_json_media_type, media_type, HeaderMap};
pub use message::{HttpRequest, HttpResponse, JsonBody};
