//! Events published by the client for whatever front end is attached.

use serde::Serialize;
use tokio::sync::broadcast;

use rjchat_shared::types::{ConversationId, UserId};

use crate::compose::SendState;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Someone signed in (`Some`) or the session ended (`None`).
    #[serde(rename_all = "camelCase")]
    SessionChanged { uid: Option<UserId> },

    /// The signed-in user's profile document was (re)loaded.
    ProfileLoaded { uid: UserId },

    #[serde(rename_all = "camelCase")]
    ConversationSelected { conversation_id: ConversationId },

    SelectionCleared,

    #[serde(rename_all = "camelCase")]
    SendStateChanged {
        conversation_id: Option<ConversationId>,
        state: SendState,
    },

    #[serde(rename_all = "camelCase")]
    MessagesSeen {
        conversation_id: ConversationId,
        count: usize,
    },

    /// A group was created, renamed, re-photographed, left or deleted.
    #[serde(rename_all = "camelCase")]
    GroupChanged { conversation_id: ConversationId },

    #[serde(rename_all = "camelCase")]
    StoryPosted { story_id: String },

    #[serde(rename_all = "camelCase")]
    StoryViewed { poster: UserId, story_id: String },

    /// An operation failed.  Front ends show this as a blocking alert.
    Alert { operation: String, message: String },
}

/// Fan-out of [`ClientEvent`]s to any number of listeners.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(event = ?e.0, "No listener for event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
