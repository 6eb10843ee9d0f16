//! The conversation list, directory search and conversation selection.

use rjchat_shared::chat_index::{has_entry, reconcile, ChatSummary, Contact, UserDirectory};
use rjchat_shared::documents::{to_document, ConversationDoc, UserInfo};
use rjchat_shared::search::{sidebar_items, SidebarItem};
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::{DocPath, Patch};

use super::json_value;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::{Selection, Session};
use crate::views::ChatListView;
use crate::Client;

impl Client {
    pub fn directory(&self) -> Result<UserDirectory> {
        let result = self.backend.directory();
        self.report("directory", result)
    }

    /// The reconciled chat index, including conversations with no message yet.
    pub fn chat_list(&self) -> Result<Vec<ChatSummary>> {
        let result = self.chat_list_inner();
        self.report("chat_list", result)
    }

    fn chat_list_inner(&self) -> Result<Vec<ChatSummary>> {
        let session = self.session()?;
        let raw = self.backend.chat_index(session.uid())?;
        Ok(reconcile(&raw, session.uid(), &self.backend.directory()?))
    }

    /// Sidebar rows for `query`: directory matches, or the active list when
    /// the query is blank.
    pub fn sidebar(&self, query: &str) -> Result<Vec<SidebarItem>> {
        let result = self.sidebar_inner(query);
        self.report("sidebar", result)
    }

    fn sidebar_inner(&self, query: &str) -> Result<Vec<SidebarItem>> {
        let session = self.session()?;
        let directory = self.backend.directory()?;
        let raw = self.backend.chat_index(session.uid())?;
        let reconciled = reconcile(&raw, session.uid(), &directory);
        Ok(sidebar_items(query, session.uid(), &directory, &reconciled))
    }

    /// Live view of the signed-in user's chat index.
    pub fn chat_list_view(&self) -> Result<ChatListView> {
        let result = self.chat_list_view_inner();
        self.report("chat_list_view", result)
    }

    fn chat_list_view_inner(&self) -> Result<ChatListView> {
        let session = self.session()?;
        let sub = self.backend.db.subscribe(&DocPath::user_chats(session.uid()))?;
        Ok(ChatListView::new(
            session.uid().clone(),
            self.backend.directory()?,
            sub,
        ))
    }

    /// Open a sidebar row.  A directory user gets a conversation created
    /// first if there is none yet.
    pub fn select(&self, item: &SidebarItem) -> Result<ConversationId> {
        let result = match item {
            SidebarItem::Chat(summary) => self
                .select_conversation(summary.conversation_id.clone(), summary.contact.clone())
                .map(|_| summary.conversation_id.clone()),
            SidebarItem::User(contact) => self.ensure_conversation(contact).and_then(|id| {
                self.select_conversation(id.clone(), contact.clone())?;
                Ok(id)
            }),
        };
        self.report("select", result)
    }

    /// Make sure a 1:1 conversation with `contact` exists and that both
    /// users' chat indexes list it.
    pub fn ensure_conversation(&self, contact: &Contact) -> Result<ConversationId> {
        let result = self.ensure_conversation_inner(contact);
        self.report("ensure_conversation", result)
    }

    fn ensure_conversation_inner(&self, contact: &Contact) -> Result<ConversationId> {
        let other = contact
            .user_id()
            .ok_or_else(|| ClientError::validation("Groups are opened from the chat list"))?;
        let session = self.session()?;
        if &other == session.uid() {
            return Err(ClientError::validation("You cannot start a chat with yourself"));
        }

        let id = ConversationId::for_pair(session.uid(), &other);
        let db = &self.backend.db;

        let chat_path = DocPath::chat(&id);
        if db.get(&chat_path)?.is_none() {
            db.set(&chat_path, to_document(&ConversationDoc::default())?)?;
            tracing::info!(conversation = %id, "conversation created");
        }

        let their_info = match self.backend.profile(&other)? {
            Some(profile) => UserInfo::from_profile(&profile),
            None => UserInfo {
                uid: Some(other.clone()),
                display_name: Some(contact.display_name.clone()),
                photo_url: contact.photo_url.clone(),
                ..Default::default()
            },
        };
        self.write_index_entry(session.uid(), &id, &their_info)?;
        self.write_index_entry(&other, &id, &own_info(&session))?;

        Ok(id)
    }

    /// Add `id` to `owner`'s chat index unless it is already there.
    fn write_index_entry(&self, owner: &UserId, id: &ConversationId, info: &UserInfo) -> Result<()> {
        let path = DocPath::user_chats(owner);
        if has_entry(&self.backend.chat_index(owner)?, id) {
            return Ok(());
        }
        self.backend.db.set_merge(
            &path,
            &Patch::new()
                .merge([id.as_str(), "userInfo"], json_value(info)?)
                .server_timestamp([id.as_str(), "date"]),
        )?;
        Ok(())
    }

    pub fn select_conversation(&self, conversation_id: ConversationId, contact: Contact) -> Result<()> {
        self.lock_state()?
            .select_conversation(conversation_id.clone(), contact);
        tracing::debug!(conversation = %conversation_id, "conversation selected");
        self.events
            .emit(ClientEvent::ConversationSelected { conversation_id });
        Ok(())
    }

    pub fn reset_conversation(&self) -> Result<()> {
        self.lock_state()?.reset_conversation();
        self.events.emit(ClientEvent::SelectionCleared);
        Ok(())
    }

    pub fn current_selection(&self) -> Option<Selection> {
        self.selection().ok()
    }
}

/// The snapshot of the signed-in user written into other people's indexes.
pub(crate) fn own_info(session: &Session) -> UserInfo {
    match &session.profile {
        Some(profile) => UserInfo::from_profile(profile),
        None => UserInfo {
            uid: Some(session.uid().clone()),
            display_name: Some(session.display_name()),
            ..Default::default()
        },
    }
}
