//! Error types for the merge engine.

use std::path::PathBuf;

/// Errors raised while parsing, merging, or writing documents.
///
/// Every variant is fatal to the call that produced it; nothing is retried
/// and no partial output is returned.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The root elements of two documents do not satisfy the root matcher.
    #[error("root elements do not match: <{original}> vs <{incoming}>")]
    StructureMismatch { original: String, incoming: String },

    /// An input could not be parsed as a well-formed document.
    #[error("failed to parse {source_name}: {message}")]
    Parse { source_name: String, message: String },

    /// The merged document could not be serialized.
    #[error("failed to write document: {message}")]
    Document { message: String },

    /// Reading an input file or writing the output file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no documents to merge")]
    NoInput,

    /// The root merge action did not emit any element.
    #[error("root merge action produced no element")]
    EmptyResult,
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;

pub(crate) fn document_error(err: impl std::fmt::Display) -> MergeError {
    MergeError::Document {
        message: err.to_string(),
    }
}
