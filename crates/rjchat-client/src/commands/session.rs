//! Account registration, sign-in/out, and the signed-in user's profile.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;

use rjchat_shared::constants::DEFAULT_ABOUT;
use rjchat_shared::documents::{to_document, UserProfile};
use rjchat_store::{AuthIdentity, BlobPath, DocPath, Document, Patch};

use crate::compose::Attachment;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::state::Session;
use crate::Client;

/// What the sign-up form collects.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<Attachment>,
}

impl Client {
    /// Create an account, its profile and its empty chat index, then sign in.
    pub async fn register(&self, registration: Registration) -> Result<UserProfile> {
        let result = self.register_inner(registration).await;
        self.report("register", result)
    }

    async fn register_inner(&self, registration: Registration) -> Result<UserProfile> {
        let name = registration.name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Please enter your name"));
        }

        let identity = self.auth.register(&registration.email, &registration.password)?;

        let avatar = match &registration.avatar {
            Some(file) => Some(
                self.backend
                    .blobs
                    .upload(&BlobPath::avatar(&identity.uid), &file.data)
                    .await?,
            ),
            None => None,
        };

        let profile = UserProfile {
            uid: identity.uid.clone(),
            name: Some(name.to_string()),
            email: Some(identity.email.clone()),
            avatar,
            about: Some(DEFAULT_ABOUT.to_string()),
            created_at: Some(Utc::now()),
            ..Default::default()
        };

        let db = &self.backend.db;
        db.set(&DocPath::user(&identity.uid), to_document(&profile)?)?;
        db.set(&DocPath::user_chats(&identity.uid), Document::new())?;

        tracing::info!(uid = %identity.uid, "registered");
        self.apply_auth_change(Some(identity))?;
        Ok(profile)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let result = self
            .auth
            .sign_in(email, password)
            .map_err(ClientError::from)
            .and_then(|identity| {
                self.apply_auth_change(Some(identity))?;
                self.session()
            });
        self.report("sign_in", result)
    }

    pub fn sign_out(&self) -> Result<()> {
        self.cancel_story_view();
        self.auth.sign_out();
        let result = self.apply_auth_change(None);
        self.report("sign_out", result)
    }

    /// React to an auth-state change: a signed-in identity gets its profile
    /// fetched, `None` clears the session and the selection.
    pub fn handle_auth_change(&self, identity: Option<AuthIdentity>) -> Result<()> {
        let result = self.apply_auth_change(identity);
        self.report("session", result)
    }

    fn apply_auth_change(&self, identity: Option<AuthIdentity>) -> Result<()> {
        let Some(identity) = identity else {
            self.lock_state()?.logout();
            self.events.emit(ClientEvent::SessionChanged { uid: None });
            return Ok(());
        };

        let uid = identity.uid.clone();
        self.lock_state()?.login(identity);
        self.events.emit(ClientEvent::SessionChanged {
            uid: Some(uid.clone()),
        });

        match self.backend.profile(&uid)? {
            Some(profile) => {
                if self.lock_state()?.set_profile(profile) {
                    self.events.emit(ClientEvent::ProfileLoaded { uid });
                }
            }
            None => tracing::debug!(uid = %uid, "no profile document"),
        }
        Ok(())
    }

    /// Follow the auth provider's session stream for the lifetime of the
    /// returned task.  Abort the handle to stop it.
    pub fn spawn_session_bootstrap(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        let mut rx = self.auth.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                // Failures are already reported as alerts.
                let _ = client.handle_auth_change(identity);
            }
        })
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session().ok()
    }

    /// Update the profile's name and about text.
    pub fn update_profile(&self, name: &str, about: &str) -> Result<UserProfile> {
        let result = self.update_profile_inner(name, about);
        self.report("update_profile", result)
    }

    fn update_profile_inner(&self, name: &str, about: &str) -> Result<UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Name cannot be empty"));
        }
        let session = self.session()?;
        self.backend.db.update(
            &DocPath::user(session.uid()),
            &Patch::new().set("name", name).set("about", about),
        )?;
        self.reload_profile(&session)
    }

    /// Replace the avatar blob and point the profile at it.
    pub async fn update_avatar(&self, image: Attachment) -> Result<String> {
        let result = self.update_avatar_inner(image).await;
        self.report("update_avatar", result)
    }

    async fn update_avatar_inner(&self, image: Attachment) -> Result<String> {
        let session = self.session()?;
        let url = self
            .backend
            .blobs
            .upload(&BlobPath::avatar(session.uid()), &image.data)
            .await?;
        self.backend.db.update(
            &DocPath::user(session.uid()),
            &Patch::new().set("avatar", url.clone()),
        )?;
        self.reload_profile(&session)?;
        Ok(url)
    }

    fn reload_profile(&self, session: &Session) -> Result<UserProfile> {
        let profile = self
            .backend
            .profile(session.uid())?
            .ok_or_else(|| rjchat_store::StoreError::NotFound(DocPath::user(session.uid()).to_string()))?;
        if self.lock_state()?.set_profile(profile.clone()) {
            self.events.emit(ClientEvent::ProfileLoaded {
                uid: profile.uid.clone(),
            });
        }
        Ok(profile)
    }
}
