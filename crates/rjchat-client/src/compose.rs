//! Outgoing message drafts and their send lifecycle.
//!
//! The composer clears its input as soon as a send starts.  If the send
//! fails, the in-flight draft is put back so nothing the user typed or
//! attached is lost.

use bytes::Bytes;
use serde::Serialize;

use rjchat_shared::documents::ReplyRef;

use crate::error::{ClientError, Result};

/// One file picked for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<ReplyRef>,
}

impl Draft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn replying_to(mut self, reply: ReplyRef) -> Self {
        self.reply_to = Some(reply);
        self
    }

    /// Nothing to send: blank text and no attachments.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SendState {
    #[default]
    Idle,
    Pending,
    #[serde(rename_all = "camelCase")]
    Confirmed { message_ids: Vec<String> },
    Failed { error: String },
}

/// Input box state for one conversation.
#[derive(Debug, Default)]
pub struct Composer {
    draft: Draft,
    in_flight: Option<Draft>,
    state: SendState,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn state(&self) -> &SendState {
        &self.state
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft.text = text.into();
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.draft.attachments.push(attachment);
    }

    pub fn set_reply(&mut self, reply: Option<ReplyRef>) {
        self.draft.reply_to = reply;
    }

    /// `Idle | Confirmed | Failed -> Pending`.  Hands out the draft and
    /// clears the input.
    pub fn begin(&mut self) -> Result<Draft> {
        if self.state == SendState::Pending {
            return Err(ClientError::SendInProgress);
        }
        if self.draft.is_empty() {
            return Err(ClientError::validation("Nothing to send"));
        }
        let draft = std::mem::take(&mut self.draft);
        self.in_flight = Some(draft.clone());
        self.state = SendState::Pending;
        Ok(draft)
    }

    /// `Pending -> Confirmed`.
    pub fn confirm(&mut self, message_ids: Vec<String>) {
        self.in_flight = None;
        self.state = SendState::Confirmed { message_ids };
    }

    /// `Pending -> Failed`.  The in-flight draft comes back; anything typed
    /// meanwhile is appended after the restored text.
    pub fn fail(&mut self, error: &ClientError) {
        if let Some(mut restored) = self.in_flight.take() {
            let typed = std::mem::take(&mut self.draft);
            if !typed.text.is_empty() {
                if !restored.text.is_empty() {
                    restored.text.push(' ');
                }
                restored.text.push_str(&typed.text);
            }
            restored.attachments.extend(typed.attachments);
            restored.reply_to = restored.reply_to.or(typed.reply_to);
            self.draft = restored;
        }
        self.state = SendState::Failed {
            error: error.to_string(),
        };
    }
}
