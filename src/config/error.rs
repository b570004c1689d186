use std::path::PathBuf;

use overlay_merge::{NodeError, TypeConflictError};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("No base document found in {0}")]
    MissingBase(PathBuf),

    #[error("Invalid override '{0}': expected KEY.PATH=VALUE")]
    InvalidOverride(String),

    #[error("Invalid override '{0}': segment '{1}' indexes a sequence; overrides can only replace or extend whole sequences")]
    IndexedOverride(String, String),

    #[error("{path}: {source}")]
    NotAMapping {
        path: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    Conflict(#[from] TypeConflictError),

    #[error("Serialization error: {0}")]
    SerializeError(String),

    #[error("Refusing to overwrite existing file: {0}")]
    AlreadyExists(PathBuf),
}

impl ConfigError {
    /// Process exit code for this error: 2 for type conflicts, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Conflict(_) => 2,
            _ => 1,
        }
    }
}
