//! Status stories: posting, the viewer's feed, view receipts, deletion.
//!
//! Expiry is checked on every read; nothing deletes stories on a timer.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use rjchat_shared::chat_index::reconcile;
use rjchat_shared::documents::{StatusDoc, Story, StoryKind, Viewer};
use rjchat_shared::stories::{build_feed, contact_set, is_active, story_ttl, visible_status, StatusFeed};
use rjchat_shared::types::UserId;
use rjchat_store::{BlobPath, DocPath, Document, Patch};

use super::json_value;
use crate::backend::Backend;
use crate::compose::Attachment;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, EventBus};
use crate::state::Session;
use crate::Client;

#[derive(Debug, Clone)]
pub struct NewStory {
    /// Image or video.
    pub media: Attachment,
    pub caption: Option<String>,
}

fn raw_stories(doc: &Document) -> Vec<Value> {
    doc.get("stories")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn raw_story_id(story: &Value) -> Option<&str> {
    story.get("id").and_then(Value::as_str)
}

/// Stored stories that are no longer visible to anyone.
fn expired_stories(doc: &Document, now: DateTime<Utc>) -> Vec<(Value, Story)> {
    raw_stories(doc)
        .into_iter()
        .filter_map(|raw| {
            let story: Story = serde_json::from_value(raw.clone()).ok()?;
            (!is_active(&story, now)).then_some((raw, story))
        })
        .collect()
}

/// Append `viewer`'s receipt to one story.  Returns `false` when nothing
/// was written: own story, unknown or expired story, or already viewed.
fn record_view(
    backend: &Backend,
    viewer: &Session,
    avatar_fallback: &str,
    poster: &UserId,
    story_id: &str,
) -> Result<bool> {
    if poster == viewer.uid() {
        return Ok(false);
    }
    let path = DocPath::status(poster);
    let now = Utc::now();
    let receipt = json_value(&Viewer {
        uid: viewer.uid().clone(),
        name: viewer.display_name(),
        avatar: viewer
            .photo_url()
            .unwrap_or_else(|| avatar_fallback.to_string()),
        timestamp: now,
    })?;

    let recorded = backend
        .db
        .update_with(&path, |doc| {
            let Some(raw) = doc
                .get_mut("stories")
                .and_then(Value::as_array_mut)
                .and_then(|stories| stories.iter_mut().find(|s| raw_story_id(s) == Some(story_id)))
            else {
                return Ok(false);
            };
            let story: Story = serde_json::from_value(raw.clone())?;
            if !is_active(&story, now) || story.viewed_by(viewer.uid()) {
                return Ok(false);
            }
            match raw.get_mut("viewers").and_then(Value::as_array_mut) {
                Some(viewers) => viewers.push(receipt),
                None => raw["viewers"] = json!([receipt]),
            }
            Ok(true)
        })?
        .unwrap_or(false);

    if recorded {
        tracing::debug!(poster = %poster, story = story_id, "story view recorded");
    }
    Ok(recorded)
}

impl Client {
    /// Upload `story` and add it to the signed-in user's status.  Stories
    /// that have already expired are pruned in the same write.
    pub async fn post_story(&self, story: NewStory) -> Result<Story> {
        let result = self.post_story_inner(story).await;
        self.report("post_story", result)
    }

    async fn post_story_inner(&self, new: NewStory) -> Result<Story> {
        let session = self.session()?;
        let path = DocPath::status(session.uid());
        let url = self
            .backend
            .blobs
            .upload(&BlobPath::image(), &new.media.data)
            .await?;

        let now = Utc::now();
        let story = Story {
            id: Uuid::new_v4().to_string(),
            url,
            kind: StoryKind::from_content_type(&new.media.content_type),
            caption: new.caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            timestamp: now,
            expires_at: Some(now + story_ttl()),
            viewers: Vec::new(),
        };

        let expired = match self.backend.db.get(&path)? {
            Some(doc) => expired_stories(&doc, now),
            None => Vec::new(),
        };

        let photo = session
            .photo_url()
            .unwrap_or_else(|| self.config.default_avatar_url.clone());
        let mut patch = Patch::new()
            .merge(
                "userInfo",
                json!({
                    "uid": session.uid(),
                    "displayName": session.display_name(),
                    "photoURL": photo,
                }),
            )
            .server_timestamp("lastUpdated");
        if !expired.is_empty() {
            patch = patch.array_remove("stories", expired.iter().map(|(raw, _)| raw.clone()).collect());
        }
        patch = patch.array_union("stories", vec![json_value(&story)?]);
        self.backend.db.set_merge(&path, &patch)?;

        for (_, old) in &expired {
            self.backend.delete_blob_best_effort(&old.url).await;
        }

        tracing::info!(story = %story.id, pruned = expired.len(), "story posted");
        self.events.emit(ClientEvent::StoryPosted {
            story_id: story.id.clone(),
        });
        Ok(story)
    }

    /// Contacts' active stories, split into new and viewed.
    pub fn status_feed(&self) -> Result<StatusFeed> {
        let result = self.status_feed_inner();
        self.report("status_feed", result)
    }

    fn status_feed_inner(&self) -> Result<StatusFeed> {
        let session = self.session()?;
        let me = session.uid();
        let directory = self.backend.directory()?;
        let index = self.backend.chat_index(me)?;
        let contacts = contact_set(&reconcile(&index, me, &directory), me);
        let docs = self.backend.statuses()?;
        Ok(build_feed(&docs, me, &contacts, Utc::now()))
    }

    /// The signed-in user's own active stories, if any.
    pub fn my_status(&self) -> Result<Option<StatusDoc>> {
        let result = self.session().and_then(|session| {
            Ok(self
                .backend
                .status(session.uid())?
                .and_then(|doc| visible_status(&doc, Utc::now())))
        });
        self.report("my_status", result)
    }

    /// Record a view receipt right away.
    pub fn record_story_view(&self, poster: &UserId, story_id: &str) -> Result<bool> {
        let result = self.session().and_then(|session| {
            record_view(
                &self.backend,
                &session,
                &self.config.default_avatar_url,
                poster,
                story_id,
            )
        });
        if let Ok(true) = result {
            self.events.emit(ClientEvent::StoryViewed {
                poster: poster.clone(),
                story_id: story_id.to_string(),
            });
        }
        self.report("record_story_view", result)
    }

    /// Record a view receipt once the story has stayed on screen for the
    /// configured delay.  Showing another story, or calling
    /// [`cancel_story_view`](Self::cancel_story_view), cancels it.
    pub fn schedule_story_view(&self, poster: UserId, story_id: String) -> Result<()> {
        let session = match self.session() {
            Ok(session) => session,
            Err(e) => return self.report("schedule_story_view", Err(e)),
        };
        self.cancel_story_view();

        let backend = self.backend.clone();
        let events: EventBus = self.events.clone();
        let delay = self.config.story_view_delay;
        let fallback = self.config.default_avatar_url.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match record_view(&backend, &session, &fallback, &poster, &story_id) {
                Ok(true) => events.emit(ClientEvent::StoryViewed { poster, story_id }),
                Ok(false) => {}
                Err(e) => tracing::error!(story = %story_id, error = %e, "Failed to record story view"),
            }
        });

        match self.story_timer.lock() {
            Ok(mut timer) => *timer = Some(handle),
            Err(_) => {
                handle.abort();
                return self.report("schedule_story_view", Err(ClientError::StatePoisoned));
            }
        }
        Ok(())
    }

    pub fn cancel_story_view(&self) {
        if let Ok(mut timer) = self.story_timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }

    /// Delete one of the signed-in user's stories and, best effort, its blob.
    pub async fn delete_story(&self, story_id: &str) -> Result<bool> {
        let result = self.delete_story_inner(story_id).await;
        self.report("delete_story", result)
    }

    async fn delete_story_inner(&self, story_id: &str) -> Result<bool> {
        let session = self.session()?;
        let path = DocPath::status(session.uid());
        let removed = self
            .backend
            .db
            .update_with(&path, |doc| {
                let Some(stories) = doc.get_mut("stories").and_then(Value::as_array_mut) else {
                    return Ok(None);
                };
                Ok(stories
                    .iter()
                    .position(|s| raw_story_id(s) == Some(story_id))
                    .map(|pos| stories.remove(pos)))
            })?
            .flatten();
        let Some(removed) = removed else {
            return Ok(false);
        };

        if let Some(url) = removed.get("url").and_then(Value::as_str) {
            self.backend.delete_blob_best_effort(url).await;
        }

        tracing::info!(story = story_id, "story deleted");
        Ok(true)
    }
}
