//! Form field extraction with fuzzy label reconciliation.
//!
//! Extracted labels from a form-recognition service are normalized and
//! folded onto the nearest canonical key seen so far in the same document.
//! [`keys`] holds the matching rules; [`field_map`] applies them per document.

pub mod config;
pub mod error;
pub mod extractor;
pub mod field_map;
pub mod keys;
pub mod provider;
pub mod schema;
pub mod store;

pub use field_map::{FieldMap, Resolution};
pub use keys::{normalize, resolve};
