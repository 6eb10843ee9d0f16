//! Chat-index reconciliation.
//!
//! Every user owns one document in `userChats` summarising the conversations
//! they take part in.  Two physical encodings of an entry coexist in that
//! document:
//!
//! - legacy flat keys, one per field: `"<cid>.userInfo"`, `"<cid>.date"`,
//!   `"<cid>.lastMessage"`, `"<cid>.unreadCount"`;
//! - modern nested objects: `"<cid>" -> {userInfo, date, lastMessage, unreadCount}`.
//!
//! [`normalize`] classifies every raw key once ([`RawIndexKey`]) and folds the
//! two encodings into exactly one [`ChatIndexEntry`] per conversation, the
//! nested values overriding the flat ones field by field.  [`reconcile`] then
//! resolves who each entry is about and orders the list.  Nothing downstream
//! of these two functions ever looks at the raw shape again.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{UNKNOWN_USER_NAME, UNNAMED_GROUP_NAME};
use crate::documents::{merge_json, LastMessage, RawDocument, UserInfo, UserProfile};
use crate::types::{ConversationId, UserId};

/// All known users, keyed by uid.  Fetched once per session.
pub type UserDirectory = HashMap<UserId, UserProfile>;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// The fields an index entry can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    UserInfo,
    Date,
    LastMessage,
    UnreadCount,
}

impl IndexField {
    pub const ALL: [IndexField; 4] = [
        IndexField::UserInfo,
        IndexField::Date,
        IndexField::LastMessage,
        IndexField::UnreadCount,
    ];

    pub fn key(self) -> &'static str {
        match self {
            IndexField::UserInfo => "userInfo",
            IndexField::Date => "date",
            IndexField::LastMessage => "lastMessage",
            IndexField::UnreadCount => "unreadCount",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// One top-level key of a raw index document, classified by encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawIndexKey<'a> {
    /// `"<cid>.<field>" -> value`
    Legacy {
        conversation: &'a str,
        field: IndexField,
        value: &'a Value,
    },
    /// `"<cid>" -> { ... }`
    Nested {
        conversation: &'a str,
        fields: &'a Map<String, Value>,
    },
}

impl<'a> RawIndexKey<'a> {
    /// Classify a key.  Keys that fit neither encoding yield `None`.
    pub fn classify(key: &'a str, value: &'a Value) -> Option<Self> {
        if let Some((conversation, suffix)) = key.rsplit_once('.') {
            if let Some(field) = IndexField::from_key(suffix) {
                if conversation.is_empty() {
                    return None;
                }
                return Some(Self::Legacy {
                    conversation,
                    field,
                    value,
                });
            }
        }
        match value {
            Value::Object(fields) if !key.is_empty() => Some(Self::Nested {
                conversation: key,
                fields,
            }),
            _ => None,
        }
    }
}

/// One logical entry of a chat index, whatever encoding it was stored in.
///
/// Any field may be missing: a merge write that has not populated every
/// sub-field yet is still a valid entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatIndexEntry {
    pub conversation_id: ConversationId,
    pub user_info: Option<UserInfo>,
    pub date: Option<DateTime<Utc>>,
    pub last_message: Option<LastMessage>,
    pub unread_count: u32,
}

impl ChatIndexEntry {
    fn from_merged(conversation_id: ConversationId, fields: &RawDocument) -> Self {
        let user_info = fields
            .get(IndexField::UserInfo.key())
            .and_then(|v| lenient::<UserInfo>(&conversation_id, "userInfo", v));
        let date = fields
            .get(IndexField::Date.key())
            .filter(|v| !v.is_null())
            .and_then(|v| lenient::<DateTime<Utc>>(&conversation_id, "date", v));
        let last_message = fields
            .get(IndexField::LastMessage.key())
            .filter(|v| v.is_object())
            .and_then(|v| lenient::<LastMessage>(&conversation_id, "lastMessage", v));
        let unread_count = fields
            .get(IndexField::UnreadCount.key())
            .and_then(Value::as_i64)
            .map(|n| n.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0);

        Self {
            conversation_id,
            user_info,
            date,
            last_message,
            unread_count,
        }
    }

    pub fn is_group(&self) -> bool {
        self.user_info.as_ref().is_some_and(|u| u.is_group)
    }
}

fn lenient<T: serde::de::DeserializeOwned>(
    conversation: &ConversationId,
    field: &str,
    value: &Value,
) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(conversation = %conversation, field, error = %e, "ignoring malformed index field");
            None
        }
    }
}

/// Fold a raw index document into one entry per conversation id, ordered by
/// conversation id.
pub fn normalize(raw: &RawDocument) -> Vec<ChatIndexEntry> {
    let mut legacy: BTreeMap<&str, RawDocument> = BTreeMap::new();
    let mut nested: BTreeMap<&str, &Map<String, Value>> = BTreeMap::new();

    for (key, value) in raw {
        match RawIndexKey::classify(key, value) {
            Some(RawIndexKey::Legacy {
                conversation,
                field,
                value,
            }) => {
                legacy
                    .entry(conversation)
                    .or_default()
                    .insert(field.key().to_string(), value.clone());
            }
            Some(RawIndexKey::Nested {
                conversation,
                fields,
            }) => {
                nested.insert(conversation, fields);
            }
            None => {
                tracing::debug!(key = %key, "skipping unrecognised index key");
            }
        }
    }

    let mut merged = legacy;
    for (conversation, fields) in nested {
        merge_json(merged.entry(conversation).or_default(), fields);
    }

    merged
        .into_iter()
        .map(|(id, fields)| ChatIndexEntry::from_merged(ConversationId::from(id), &fields))
        .collect()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Who a conversation is with, as shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// The other user's uid, or the conversation id for groups.
    pub id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_group: bool,
}

impl Contact {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            id: profile.uid.0.clone(),
            display_name: profile.display_name().to_string(),
            photo_url: profile.photo_url().map(str::to_string),
            is_group: false,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        (!self.is_group).then(|| UserId(self.id.clone()))
    }
}

/// A reconciled row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub conversation_id: ConversationId,
    pub contact: Contact,
    pub last_message: Option<String>,
    pub unread_count: u32,
    /// `None` while the server timestamp of the latest write is pending.
    pub last_activity: Option<DateTime<Utc>>,
}

impl ChatSummary {
    /// Whether this conversation belongs to the active list.
    pub fn is_active(&self) -> bool {
        self.last_message.is_some()
    }
}

fn resolve_contact(entry: &ChatIndexEntry, me: &UserId, directory: &UserDirectory) -> Option<Contact> {
    let info = entry.user_info.as_ref();

    if entry.is_group() {
        return Some(Contact {
            id: entry.conversation_id.0.clone(),
            display_name: info
                .and_then(UserInfo::display_name)
                .unwrap_or(UNNAMED_GROUP_NAME)
                .to_string(),
            photo_url: info.and_then(UserInfo::photo_url).map(str::to_string),
            is_group: true,
        });
    }

    let other = entry
        .conversation_id
        .counterpart(me)
        .or_else(|| info.and_then(|u| u.uid.clone()));

    if let Some(profile) = other.as_ref().and_then(|uid| directory.get(uid)) {
        return Some(Contact::from_profile(profile));
    }

    if let Some(info) = info.filter(|u| u.display_name().is_some() || u.uid.is_some()) {
        return Some(Contact {
            id: other
                .or_else(|| info.uid.clone())
                .map(|u| u.0)
                .unwrap_or_default(),
            display_name: info.display_name().unwrap_or(UNKNOWN_USER_NAME).to_string(),
            photo_url: info.photo_url().map(str::to_string),
            is_group: false,
        });
    }

    other.map(|uid| Contact {
        id: uid.0,
        display_name: UNKNOWN_USER_NAME.to_string(),
        photo_url: None,
        is_group: false,
    })
}

/// Missing dates first (a write is in flight), then newest first.  The
/// conversation id breaks ties so the order is total.
fn by_activity(a: &ChatSummary, b: &ChatSummary) -> Ordering {
    match (a.last_activity, b.last_activity) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(&x),
    }
    .then_with(|| a.conversation_id.cmp(&b.conversation_id))
}

/// Build the ordered conversation list for `me` from a raw index document and
/// the user directory.
pub fn reconcile(raw: &RawDocument, me: &UserId, directory: &UserDirectory) -> Vec<ChatSummary> {
    let mut list: Vec<ChatSummary> = normalize(raw)
        .into_iter()
        .filter_map(|entry| {
            let contact = resolve_contact(&entry, me, directory)?;
            Some(ChatSummary {
                conversation_id: entry.conversation_id,
                contact,
                last_message: entry.last_message.map(|m| m.text),
                unread_count: entry.unread_count,
                last_activity: entry.date,
            })
        })
        .collect();
    list.sort_by(by_activity);
    list
}

/// Whether the raw index document holds an entry for `conversation` in
/// either encoding.
pub fn has_entry(raw: &RawDocument, conversation: &ConversationId) -> bool {
    raw.contains_key(conversation.as_str())
        || IndexField::ALL
            .iter()
            .any(|f| raw.contains_key(&format!("{}.{}", conversation, f.key())))
}
