use thiserror::Error;

use rjchat_shared::DocumentError;
use rjchat_store::StoreError;

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Input rejected before any store or blob call was made.
    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("No conversation selected")]
    NoSelection,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Not a group conversation: {0}")]
    NotAGroup(String),

    #[error("Only the group admin can do that")]
    NotAdmin,

    #[error("A message is already being sent")]
    SendInProgress,

    #[error("Application state lock poisoned")]
    StatePoisoned,
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
