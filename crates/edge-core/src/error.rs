use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A snippet definition file is not valid relaxed JSON or has the wrong shape.
    #[error("failed to parse snippet file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid trigger pattern: {0}")]
    InvalidTrigger(#[from] regex::Error),

    /// The host rejected a buffer replacement.
    #[error("buffer mutation failed: {0}")]
    Mutation(String),

    #[error("failed to watch {0}")]
    Watch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EdgeError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EdgeError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, EdgeError>;
