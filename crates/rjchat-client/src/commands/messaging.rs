//! Sending, reading, marking seen and deleting messages.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use rjchat_shared::chat_index::normalize;
use rjchat_shared::constants::{FILE_SUMMARY_PREFIX, IMAGE_SUMMARY_TEXT};
use rjchat_shared::documents::{
    ConversationDoc, FileRef, LastMessage, Message, MessageStatus, RawDocument,
};
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::{BlobPath, DocPath, Patch};

use super::json_value;
use crate::compose::{Attachment, Composer, Draft};
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::Session;
use crate::views::ConversationView;
use crate::Client;

/// The typed message list of a raw `chats/<id>` document.
fn messages_of(doc: &RawDocument) -> rjchat_store::Result<Vec<Message>> {
    let conversation: ConversationDoc = serde_json::from_value(Value::Object(doc.clone()))?;
    Ok(conversation.messages)
}

/// The chat-list preview for one send.
fn summary_text(text: &str, attachments: &[Attachment]) -> String {
    if !text.is_empty() {
        return text.to_string();
    }
    match attachments.last() {
        Some(a) if a.is_image() => IMAGE_SUMMARY_TEXT.to_string(),
        Some(a) => format!("{FILE_SUMMARY_PREFIX}{}", a.name),
        None => String::new(),
    }
}

impl Client {
    /// Send `draft` to the selected conversation.
    pub async fn send(&self, draft: Draft) -> Result<Vec<Message>> {
        let result = self.send_selected(draft).await;
        self.report("send", result)
    }

    async fn send_selected(&self, draft: Draft) -> Result<Vec<Message>> {
        let session = self.session()?;
        let selection = self.selection()?;
        self.deliver(
            &session,
            &selection.conversation_id,
            selection.contact.user_id(),
            draft,
        )
        .await
    }

    /// Send `draft` to a conversation other than the selected one.
    pub async fn send_to(&self, id: &ConversationId, draft: Draft) -> Result<Vec<Message>> {
        let result = match self.session() {
            Ok(session) => self.deliver(&session, id, None, draft).await,
            Err(e) => Err(e),
        };
        self.report("send", result)
    }

    /// Send the composer's draft, driving its send state.  On failure the
    /// draft is restored into the composer.
    pub async fn send_draft(&self, composer: &mut Composer) -> Result<Vec<Message>> {
        let conversation_id = self.selection().ok().map(|s| s.conversation_id);
        let draft = match composer.begin() {
            Ok(draft) => draft,
            Err(e) => return self.report("send", Err(e)),
        };
        self.emit_send_state(&conversation_id, composer);

        let result = self.send(draft).await;
        match &result {
            Ok(messages) => composer.confirm(messages.iter().map(|m| m.id.clone()).collect()),
            Err(e) => composer.fail(e),
        }
        self.emit_send_state(&conversation_id, composer);
        result
    }

    fn emit_send_state(&self, conversation_id: &Option<ConversationId>, composer: &Composer) {
        self.events.emit(ClientEvent::SendStateChanged {
            conversation_id: conversation_id.clone(),
            state: composer.state().clone(),
        });
    }

    /// Append the draft's messages, then update every participant's index.
    ///
    /// Each attachment becomes its own message.  Already-appended messages
    /// stay when a later upload or append fails.
    async fn deliver(
        &self,
        session: &Session,
        id: &ConversationId,
        counterpart: Option<UserId>,
        draft: Draft,
    ) -> Result<Vec<Message>> {
        if draft.is_empty() {
            return Err(ClientError::validation("Nothing to send"));
        }

        let me = session.uid();
        let conversation = self
            .backend
            .conversation(id)?
            .ok_or_else(|| ClientError::ConversationNotFound(id.to_string()))?;

        // Read fresh on every send so membership changes are honoured.
        let mut recipients: Vec<UserId> = if conversation.is_group() {
            conversation.participants.clone()
        } else {
            let other = counterpart
                .or_else(|| id.counterpart(me))
                .ok_or_else(|| ClientError::validation("Cannot tell who this conversation is with"))?;
            vec![other]
        };
        if !recipients.contains(me) {
            recipients.push(me.clone());
        }

        let text = draft.text.trim().to_string();
        let sender_name = Some(session.display_name());
        let chat_path = DocPath::chat(id);

        let mut sent = Vec::new();
        if draft.attachments.is_empty() {
            let message = Message {
                id: Uuid::new_v4().to_string(),
                text: text.clone(),
                sender_id: me.clone(),
                sender_name: sender_name.clone(),
                date: Utc::now(),
                status: MessageStatus::Sent,
                img: None,
                file: None,
                reply_to: draft.reply_to.clone(),
            };
            self.append(&chat_path, &message)?;
            sent.push(message);
        }

        for (index, attachment) in draft.attachments.iter().enumerate() {
            let first = index == 0;
            let blob = if attachment.is_image() {
                BlobPath::image()
            } else {
                BlobPath::file()
            };
            let url = self.backend.blobs.upload(&blob, &attachment.data).await?;

            let (img, file) = if attachment.is_image() {
                (Some(url), None)
            } else {
                let file = FileRef {
                    url,
                    name: attachment.name.clone(),
                    content_type: attachment.content_type.clone(),
                };
                (None, Some(file))
            };

            let message = Message {
                id: Uuid::new_v4().to_string(),
                text: if first { text.clone() } else { String::new() },
                sender_id: me.clone(),
                sender_name: sender_name.clone(),
                date: Utc::now(),
                status: MessageStatus::Sent,
                img,
                file,
                reply_to: if first { draft.reply_to.clone() } else { None },
            };
            self.append(&chat_path, &message)?;
            sent.push(message);
        }

        let last = json_value(&LastMessage {
            text: summary_text(&text, &draft.attachments),
        })?;
        for uid in &recipients {
            let mut patch = Patch::new()
                .merge([id.as_str(), "lastMessage"], last.clone())
                .server_timestamp([id.as_str(), "date"]);
            if uid != me {
                patch = patch.increment([id.as_str(), "unreadCount"], 1);
            }
            self.backend.db.set_merge(&DocPath::user_chats(uid), &patch)?;
        }

        tracing::info!(
            conversation = %id,
            messages = sent.len(),
            recipients = recipients.len(),
            "message sent"
        );
        Ok(sent)
    }

    fn append(&self, chat_path: &DocPath, message: &Message) -> Result<()> {
        self.backend.db.update(
            chat_path,
            &Patch::new().array_union("messages", vec![json_value(message)?]),
        )?;
        Ok(())
    }

    pub fn messages(&self, id: &ConversationId) -> Result<Vec<Message>> {
        let result = self
            .backend
            .conversation(id)
            .map(|c| c.map(|c| c.messages).unwrap_or_default());
        self.report("messages", result)
    }

    /// Mark every incoming message of `id` as seen and reset the viewer's
    /// unread counter.  Returns how many messages changed.
    pub fn mark_seen(&self, id: &ConversationId) -> Result<usize> {
        let result = self.mark_seen_inner(id);
        self.report("mark_seen", result)
    }

    fn mark_seen_inner(&self, id: &ConversationId) -> Result<usize> {
        let session = self.session()?;
        let me = session.uid();
        let changed = self
            .backend
            .db
            .update_with(&DocPath::chat(id), |doc| {
                let mut messages = messages_of(doc)?;
                let mut changed = 0;
                for message in messages.iter_mut() {
                    if &message.sender_id != me && message.status != MessageStatus::Seen {
                        message.status = MessageStatus::Seen;
                        changed += 1;
                    }
                }
                if changed > 0 {
                    doc.insert("messages".to_string(), serde_json::to_value(&messages)?);
                }
                Ok(changed)
            })?
            .ok_or_else(|| ClientError::ConversationNotFound(id.to_string()))?;

        let index = self.backend.chat_index(me)?;
        let unread = normalize(&index)
            .into_iter()
            .find(|entry| &entry.conversation_id == id)
            .map(|entry| entry.unread_count);
        if unread.is_some_and(|n| n > 0) {
            self.backend.db.set_merge(
                &DocPath::user_chats(me),
                &Patch::new().set([id.as_str(), "unreadCount"], 0),
            )?;
        }

        if changed > 0 {
            tracing::debug!(conversation = %id, changed, "messages seen");
            self.events.emit(ClientEvent::MessagesSeen {
                conversation_id: id.clone(),
                count: changed,
            });
        }
        Ok(changed)
    }

    /// Subscribe to the selected conversation and mark it seen.
    pub fn open_conversation(&self) -> Result<ConversationView> {
        let result = self.open_conversation_inner();
        self.report("open_conversation", result)
    }

    fn open_conversation_inner(&self) -> Result<ConversationView> {
        let selection = self.selection()?;
        let id = selection.conversation_id;
        let sub = self.backend.db.subscribe(&DocPath::chat(&id))?;
        let view = ConversationView::new(id.clone(), sub);
        if view.document()?.is_some() {
            self.mark_seen_inner(&id)?;
        }
        Ok(view)
    }

    /// Wait for the next change to `view` and mark new incoming messages
    /// seen.  Returns `false` when the conversation is gone or the store
    /// has shut down.
    pub async fn follow_conversation(&self, view: &mut ConversationView) -> Result<bool> {
        if !view.changed().await {
            return Ok(false);
        }
        let result = match view.document() {
            Ok(Some(_)) => self.mark_seen_inner(view.conversation_id()).map(|_| true),
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };
        self.report("follow_conversation", result)
    }

    /// Delete one of the signed-in user's own messages.
    pub fn delete_message(&self, id: &ConversationId, message_id: &str) -> Result<bool> {
        self.delete_messages(id, &[message_id.to_string()])
            .map(|n| n > 0)
    }

    /// Delete several of the signed-in user's own messages in one rewrite.
    /// Ids of other people's messages are ignored.
    pub fn delete_messages(&self, id: &ConversationId, message_ids: &[String]) -> Result<usize> {
        let result = self.delete_messages_inner(id, message_ids);
        self.report("delete_messages", result)
    }

    fn delete_messages_inner(&self, id: &ConversationId, message_ids: &[String]) -> Result<usize> {
        let session = self.session()?;
        let removed = self
            .backend
            .db
            .update_with(&DocPath::chat(id), |doc| {
                let mut messages = messages_of(doc)?;
                let before = messages.len();
                messages.retain(|m| !(message_ids.contains(&m.id) && &m.sender_id == session.uid()));
                let removed = before - messages.len();
                if removed > 0 {
                    doc.insert("messages".to_string(), serde_json::to_value(&messages)?);
                }
                Ok(removed)
            })?
            .ok_or_else(|| ClientError::ConversationNotFound(id.to_string()))?;

        if removed > 0 {
            tracing::info!(conversation = %id, removed, "messages deleted");
        }
        Ok(removed)
    }
}
