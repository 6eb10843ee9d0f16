//! Typed access to the shared backend collaborators.
//!
//! A [`Backend`] is cheap to clone and can be shared by several clients,
//! which is how two users talk to each other in tests.

use std::sync::Arc;

use rjchat_shared::chat_index::UserDirectory;
use rjchat_shared::constants::{STATUSES_COLLECTION, USERS_COLLECTION};
use rjchat_shared::documents::{from_document, ConversationDoc, RawDocument, StatusDoc, UserProfile};
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::{BlobStore, Database, DocPath};

use crate::config::ClientConfig;
use crate::error::Result;

#[derive(Clone)]
pub struct Backend {
    pub db: Arc<Database>,
    pub blobs: Arc<BlobStore>,
}

impl Backend {
    pub fn new(db: Arc<Database>, blobs: Arc<BlobStore>) -> Self {
        Self { db, blobs }
    }

    /// Open the document store and blob directory named by `config`.
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        let blobs = BlobStore::new(config.blob_storage_path.clone(), config.max_blob_size).await?;
        Ok(Self::new(Arc::new(db), Arc::new(blobs)))
    }

    pub fn profile(&self, uid: &UserId) -> Result<Option<UserProfile>> {
        let path = DocPath::user(uid);
        let Some(doc) = self.db.get(&path)? else {
            return Ok(None);
        };
        let mut profile: UserProfile = from_document(&path.to_string(), doc)?;
        if profile.uid.as_str().is_empty() {
            profile.uid = uid.clone();
        }
        Ok(Some(profile))
    }

    /// Every readable profile, keyed by uid.  Malformed documents are skipped.
    pub fn directory(&self) -> Result<UserDirectory> {
        let mut directory = UserDirectory::new();
        for (id, doc) in self.db.list(USERS_COLLECTION)? {
            match from_document::<UserProfile>(&format!("{USERS_COLLECTION}/{id}"), doc) {
                Ok(mut profile) => {
                    if profile.uid.as_str().is_empty() {
                        profile.uid = UserId::new(id.as_str());
                    }
                    directory.insert(UserId::new(id), profile);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable profile"),
            }
        }
        Ok(directory)
    }

    pub fn conversation(&self, id: &ConversationId) -> Result<Option<ConversationDoc>> {
        let path = DocPath::chat(id);
        match self.db.get(&path)? {
            Some(doc) => Ok(Some(from_document(&path.to_string(), doc)?)),
            None => Ok(None),
        }
    }

    /// A user's raw chat index; a missing document reads as empty.
    pub fn chat_index(&self, uid: &UserId) -> Result<RawDocument> {
        Ok(self.db.get(&DocPath::user_chats(uid))?.unwrap_or_default())
    }

    pub fn status(&self, uid: &UserId) -> Result<Option<StatusDoc>> {
        let path = DocPath::status(uid);
        match self.db.get(&path)? {
            Some(doc) => Ok(Some(from_document(&path.to_string(), doc)?)),
            None => Ok(None),
        }
    }

    /// Every readable status document.  Malformed documents are skipped.
    pub fn statuses(&self) -> Result<Vec<StatusDoc>> {
        let mut docs = Vec::new();
        for (id, doc) in self.db.list(STATUSES_COLLECTION)? {
            match from_document::<StatusDoc>(&format!("{STATUSES_COLLECTION}/{id}"), doc) {
                Ok(status) => docs.push(status),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable status"),
            }
        }
        Ok(docs)
    }

    /// Delete a blob, logging instead of failing.
    pub async fn delete_blob_best_effort(&self, url: &str) {
        if let Err(e) = self.blobs.delete(url).await {
            tracing::warn!(url, error = %e, "Failed to delete blob");
        }
    }
}
