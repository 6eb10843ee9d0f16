//! Scoped live views.
//!
//! Each view owns exactly one store [`Subscription`]; dropping the view
//! stops it.  Views only read.  Writes triggered by what a view shows (such
//! as marking messages seen) go through the [`Client`](crate::Client).

use std::collections::HashMap;

use rjchat_shared::chat_index::{reconcile, ChatSummary, Contact, UserDirectory};
use rjchat_shared::documents::{from_document, ConversationDoc, Message};
use rjchat_shared::search::{sidebar_items, SidebarItem};
use rjchat_shared::stories::contact_set;
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::Subscription;

use crate::error::Result;

/// The signed-in user's conversation list.
pub struct ChatListView {
    me: UserId,
    directory: UserDirectory,
    sub: Subscription,
}

impl ChatListView {
    pub(crate) fn new(me: UserId, directory: UserDirectory, sub: Subscription) -> Self {
        Self { me, directory, sub }
    }

    /// Reconciled entries, including ones without a message yet.
    pub fn summaries(&self) -> Vec<ChatSummary> {
        reconcile(&self.sub.current().unwrap_or_default(), &self.me, &self.directory)
    }

    /// Search results for a non-blank query, the active list otherwise.
    pub fn sidebar(&self, query: &str) -> Vec<SidebarItem> {
        sidebar_items(query, &self.me, &self.directory, &self.summaries())
    }

    pub fn contacts(&self) -> HashMap<UserId, Contact> {
        contact_set(&self.summaries(), &self.me)
    }

    pub fn set_directory(&mut self, directory: UserDirectory) {
        self.directory = directory;
    }

    /// Wait for the index to change.  `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.sub.changed().await.is_some()
    }
}

/// One open conversation.
pub struct ConversationView {
    conversation_id: ConversationId,
    sub: Subscription,
}

impl ConversationView {
    pub(crate) fn new(conversation_id: ConversationId, sub: Subscription) -> Self {
        Self {
            conversation_id,
            sub,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// The conversation as last seen.  `None` once it has been deleted.
    pub fn document(&self) -> Result<Option<ConversationDoc>> {
        match self.sub.current() {
            Some(doc) => Ok(Some(from_document(&self.sub.path().to_string(), doc)?)),
            None => Ok(None),
        }
    }

    pub fn messages(&self) -> Result<Vec<Message>> {
        Ok(self.document()?.map(|d| d.messages).unwrap_or_default())
    }

    /// Wait for the conversation to change.  `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.sub.changed().await.is_some()
    }
}
