use std::path::{Path, PathBuf};

/// Failure to resolve a logical path, package, or class on the classpath.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("{query} is not present on the classpath (search path: {})", display_search_path(.search_path))]
    NotFound {
        query: String,
        search_path: Vec<PathBuf>,
    },

    #[error("class {class_name} not found on the classpath (search path: {})", display_search_path(.search_path))]
    ClassNotFound {
        class_name: String,
        search_path: Vec<PathBuf>,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

/// Failure while copying a contribution into the target directory.
#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Classpath entries joined with `:`, the way they are given on the command
/// line.
pub fn display_search_path(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|entry| entry.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

pub(crate) fn resolution_io(path: &Path) -> impl Fn(std::io::Error) -> ResolutionError + '_ {
    move |source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn deposit_io(path: &Path) -> impl Fn(std::io::Error) -> DepositError + '_ {
    move |source| DepositError::Io {
        path: path.to_path_buf(),
        source,
    }
}
