//! Typed shapes of the documents kept in the remote store.
//!
//! The store itself is schemaless; these structs are the client's reading of
//! it.  Fields written by older clients under a different name (`name` /
//! `avatar` versus `displayName` / `photoURL`) are kept side by side and
//! resolved through accessor methods rather than serde aliases, because a
//! merged document may legitimately carry both spellings at once.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::FALLBACK_USER_NAME;
use crate::error::DocumentError;
use crate::types::UserId;

/// A raw document as handed out by the store.
pub type RawDocument = Map<String, Value>;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A profile document in the `users` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub uid: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        non_empty(self.display_name.as_deref())
            .or(non_empty(self.name.as_deref()))
            .unwrap_or(FALLBACK_USER_NAME)
    }

    pub fn photo_url(&self) -> Option<&str> {
        non_empty(self.photo_url.as_deref()).or(non_empty(self.avatar.as_deref()))
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Seen,
}

/// A non-image attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Quote of the message being replied to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// One element of a conversation's `messages` array.
///
/// Immutable once appended except for `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Sender's clock at send time.
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Group,
}

/// A document in the `chats` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDoc {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConversationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<UserId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationDoc {
    pub fn is_group(&self) -> bool {
        self.kind == Some(ConversationKind::Group)
    }

    pub fn is_admin(&self, uid: &UserId) -> bool {
        self.admin.as_ref() == Some(uid)
    }
}

// ---------------------------------------------------------------------------
// Chat index entry fields
// ---------------------------------------------------------------------------

/// Identity snapshot embedded in a chat-index entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_group: bool,
}

impl UserInfo {
    pub fn display_name(&self) -> Option<&str> {
        non_empty(self.display_name.as_deref()).or(non_empty(self.name.as_deref()))
    }

    pub fn photo_url(&self) -> Option<&str> {
        non_empty(self.photo_url.as_deref()).or(non_empty(self.avatar.as_deref()))
    }

    /// Snapshot of a profile as written into someone else's index.
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            uid: Some(profile.uid.clone()),
            name: None,
            display_name: Some(profile.display_name().to_string()),
            avatar: None,
            photo_url: profile.photo_url().map(str::to_string),
            is_group: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    #[serde(default)]
    pub text: String,
}

// ---------------------------------------------------------------------------
// Status / stories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoryKind {
    Image,
    Video,
}

impl StoryKind {
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video") {
            Self::Video
        } else {
            Self::Image
        }
    }
}

/// Receipt left on a story by someone who watched it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewer {
    pub uid: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: StoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub viewers: Vec<Viewer>,
}

impl Story {
    pub fn viewed_by(&self, uid: &UserId) -> bool {
        self.viewers.iter().any(|v| &v.uid == uid)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub uid: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A document in the `statuses` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusDoc {
    pub user_info: StatusInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stories: Vec<Story>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Decode a raw document into one of the typed shapes above.
pub fn from_document<T: DeserializeOwned>(path: &str, doc: RawDocument) -> Result<T, DocumentError> {
    serde_json::from_value(Value::Object(doc)).map_err(|source| DocumentError::Malformed {
        path: path.to_string(),
        source,
    })
}

/// Encode a typed shape into a raw document.  The value must serialize to a
/// JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<RawDocument, DocumentError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DocumentError::Serialization(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

/// Recursively union `overlay` into `base`.  Nested objects are merged key by
/// key; any other overlay value replaces what `base` had.
pub fn merge_json(base: &mut RawDocument, overlay: &RawDocument) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_json(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> RawDocument {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn profile_accepts_both_naming_schemes() {
        let legacy: UserProfile =
            from_document("users/a", obj(json!({"uid": "a", "name": "Ann", "avatar": "x.png"})))
                .unwrap();
        assert_eq!(legacy.display_name(), "Ann");
        assert_eq!(legacy.photo_url(), Some("x.png"));

        let modern: UserProfile = from_document(
            "users/b",
            obj(json!({"uid": "b", "displayName": "Bob", "photoURL": "y.png", "name": "old"})),
        )
        .unwrap();
        assert_eq!(modern.display_name(), "Bob");
        assert_eq!(modern.photo_url(), Some("y.png"));
    }

    #[test]
    fn message_wire_shape() {
        let msg: Message = from_document(
            "chats/x",
            obj(json!({
                "id": "m1",
                "text": "hi",
                "senderId": "A1",
                "date": "2024-05-01T10:00:00Z",
                "status": "sent",
                "file": {"url": "blob:files/1", "name": "a.pdf", "type": "application/pdf"}
            })),
        )
        .unwrap();
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.file.unwrap().content_type, "application/pdf");

        let encoded = to_document(&ConversationDoc::default()).unwrap();
        assert_eq!(Value::Object(encoded), json!({"messages": []}));
    }

    #[test]
    fn merge_json_unions_nested_objects() {
        let mut base = obj(json!({"userInfo": {"uid": "a", "name": "Ann"}, "unreadCount": 2}));
        merge_json(
            &mut base,
            &obj(json!({"userInfo": {"displayName": "Annie"}, "unreadCount": 0})),
        );
        assert_eq!(
            Value::Object(base),
            json!({"userInfo": {"uid": "a", "name": "Ann", "displayName": "Annie"}, "unreadCount": 0})
        );
    }
}
