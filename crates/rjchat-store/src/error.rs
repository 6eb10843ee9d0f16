use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite / SQLCipher error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A document that had to exist was missing.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored document body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mutex guarding the connection was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    /// A blob path or URL that is malformed or tries to escape the store.
    #[error("Invalid blob path: {0}")]
    InvalidBlobPath(String),

    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Hashing a new password or reading a stored hash failed.
    #[error("Password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
