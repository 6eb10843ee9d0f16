//! Value types handed across the store boundary.

use serde::{Deserialize, Serialize};

use rjchat_shared::constants::{
    CHATS_COLLECTION, STATUSES_COLLECTION, USERS_COLLECTION, USER_CHATS_COLLECTION,
};
use rjchat_shared::types::{ConversationId, UserId};

pub use rjchat_shared::documents::RawDocument as Document;

// ---------------------------------------------------------------------------
// Document path
// ---------------------------------------------------------------------------

/// Address of one document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn user(uid: &UserId) -> Self {
        Self::new(USERS_COLLECTION, uid.as_str())
    }

    pub fn user_chats(uid: &UserId) -> Self {
        Self::new(USER_CHATS_COLLECTION, uid.as_str())
    }

    pub fn chat(id: &ConversationId) -> Self {
        Self::new(CHATS_COLLECTION, id.as_str())
    }

    pub fn status(uid: &UserId) -> Self {
        Self::new(STATUSES_COLLECTION, uid.as_str())
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

// ---------------------------------------------------------------------------
// Auth identity
// ---------------------------------------------------------------------------

/// The identity the auth provider issues for a signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub uid: UserId,
    pub email: String,
}
