use thiserror::Error;

/// Errors raised while interpreting raw documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
