use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Opaque uid issued by the auth provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a conversation document.
///
/// 1:1 conversations use [`ConversationId::for_pair`] so that both
/// participants derive the same id without talking to each other.  Groups use
/// a random id from [`ConversationId::new_group`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Derive the 1:1 conversation id: the greater uid comes first.
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        if a.0 > b.0 {
            Self(format!("{}{}", a.0, b.0))
        } else {
            Self(format!("{}{}", b.0, a.0))
        }
    }

    pub fn new_group() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the other participant of a 1:1 conversation by removing `me`
    /// from the id.  Returns `None` when `me` is not a prefix or suffix of the
    /// id, or when nothing is left over.
    pub fn counterpart(&self, me: &UserId) -> Option<UserId> {
        if me.0.is_empty() {
            return None;
        }
        let rest = self
            .0
            .strip_prefix(me.as_str())
            .or_else(|| self.0.strip_suffix(me.as_str()))?;
        if rest.is_empty() {
            None
        } else {
            Some(UserId(rest.to_string()))
        }
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
