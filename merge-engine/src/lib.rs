//! # merge-engine
//!
//! Structural N-way merge of XML configuration documents.
//!
//! Documents are parsed into an arena of elements, folded together left to
//! right, and serialized back to stable XML. Which elements correspond, how
//! incoming elements are renamed, and how each pair reaches the output are
//! decided per tag by a [`StrategyRegistry`].
//!
//! ## Example
//!
//! ```rust
//! use merge_engine::DocumentMergeService;
//!
//! let service = DocumentMergeService::default();
//! let merged = service
//!     .merge_texts(&[
//!         r#"<config><a x="1"/></config>"#,
//!         r#"<config><a y="2"/><b/></config>"#,
//!     ])
//!     .unwrap();
//! assert!(merged.contains(r#"<a x="1" y="2"/>"#));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod service;
pub mod strategy;
pub mod types;
pub mod writer;

pub use config::MergeConfig;
pub use engine::TreeMergeEngine;
pub use error::{MergeError, MergeResult};
pub use parser::{parse_bytes, parse_file, parse_str};
pub use service::DocumentMergeService;
pub use strategy::{ElementRule, MappedNode, Mapper, Matcher, MergeAction, StrategyRegistry};
pub use types::{Document, NodeId, NodeRef};
pub use writer::{DEFAULT_INDENT, to_xml_string, write_document};
