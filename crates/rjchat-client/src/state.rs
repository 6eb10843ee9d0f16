//! Session state shared by every client operation.
//!
//! [`AppState`] is wrapped in `Arc<Mutex<>>` and handed to the [`Client`]
//! at construction.  It only changes through the transition methods below,
//! so "who is signed in" and "which conversation is open" can never drift
//! apart: logging out always drops the selection with it.
//!
//! [`Client`]: crate::Client

use serde::Serialize;

use rjchat_shared::chat_index::Contact;
use rjchat_shared::constants::FALLBACK_USER_NAME;
use rjchat_shared::documents::UserProfile;
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::AuthIdentity;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity: AuthIdentity,
    /// The user's `users/<uid>` document.  `None` until fetched, or when the
    /// account never got a profile written.
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn uid(&self) -> &UserId {
        &self.identity.uid
    }

    pub fn display_name(&self) -> String {
        self.profile
            .as_ref()
            .map_or(FALLBACK_USER_NAME, |p| p.display_name())
            .to_string()
    }

    pub fn photo_url(&self) -> Option<String> {
        self.profile
            .as_ref()
            .and_then(|p| p.photo_url())
            .map(str::to_string)
    }
}

/// The conversation currently open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub conversation_id: ConversationId,
    pub contact: Contact,
}

#[derive(Debug, Default)]
pub struct AppState {
    session: Option<Session>,
    selection: Option<Selection>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session.  Re-announcing the current user keeps its profile
    /// and selection; a different user starts from scratch.
    pub fn login(&mut self, identity: AuthIdentity) {
        if self.session.as_ref().map(|s| &s.identity.uid) == Some(&identity.uid) {
            if let Some(session) = self.session.as_mut() {
                session.identity = identity;
            }
            return;
        }
        self.session = Some(Session {
            identity,
            profile: None,
        });
        self.selection = None;
    }

    /// Attach the fetched profile.  Ignored when it belongs to someone other
    /// than the signed-in user (a late fetch after a user switch).
    pub fn set_profile(&mut self, profile: UserProfile) -> bool {
        match self.session.as_mut() {
            Some(session) if session.identity.uid == profile.uid => {
                session.profile = Some(profile);
                true
            }
            _ => false,
        }
    }

    pub fn logout(&mut self) {
        self.session = None;
        self.selection = None;
    }

    pub fn select_conversation(&mut self, conversation_id: ConversationId, contact: Contact) {
        self.selection = Some(Selection {
            conversation_id,
            contact,
        });
    }

    pub fn reset_conversation(&mut self) {
        self.selection = None;
    }
}
