//! YAML Loader module
//!
//! Parse source definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `load_source` / `load_source_from_str` - parse a `SourceDefinition`
//! - Validation of URLs, templates, cursor, refinement and output settings

mod parser;

pub use parser::{load_source, load_source_from_str, validate_source};
