//! Group conversations: create, rename, re-photo, membership, delete.
//!
//! The conversation document is written first, then every participant's
//! chat index.  A failure part way through leaves the earlier writes in
//! place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use rjchat_shared::chat_index::{Contact, IndexField};
use rjchat_shared::constants::{GROUP_CREATED_TEXT, UNKNOWN_USER_NAME, UNNAMED_GROUP_NAME};
use rjchat_shared::documents::{
    to_document, ConversationDoc, ConversationKind, LastMessage, UserInfo, UserProfile,
};
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::{BlobPath, DocPath, Patch};

use super::json_value;
use crate::compose::Attachment;
use crate::error::{ClientError, Result};
use crate::events::ClientEvent;
use crate::Client;

/// What the create-group form collects.
#[derive(Debug, Clone, Default)]
pub struct NewGroup {
    pub name: String,
    /// Other members; the creator is added automatically.
    pub members: Vec<UserId>,
    pub photo: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub uid: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub conversation_id: ConversationId,
    pub name: String,
    pub photo_url: Option<String>,
    pub admin: Option<UserId>,
    pub members: Vec<GroupMember>,
    pub created_at: Option<DateTime<Utc>>,
}

fn group_snapshot(id: &ConversationId, name: &str, photo: Option<&str>) -> UserInfo {
    UserInfo {
        uid: Some(UserId::new(id.as_str())),
        display_name: Some(name.to_string()),
        photo_url: photo.map(str::to_string),
        is_group: true,
        ..Default::default()
    }
}

impl Client {
    pub async fn create_group(&self, group: NewGroup) -> Result<ConversationId> {
        let result = self.create_group_inner(group).await;
        self.report("create_group", result)
    }

    async fn create_group_inner(&self, group: NewGroup) -> Result<ConversationId> {
        let name = group.name.trim().to_string();
        if name.is_empty() {
            return Err(ClientError::validation("Please enter a group name"));
        }
        let session = self.session()?;
        let me = session.uid().clone();

        let mut participants = vec![me.clone()];
        for uid in group.members {
            if !participants.contains(&uid) {
                participants.push(uid);
            }
        }
        if participants.len() < 2 {
            return Err(ClientError::validation("Please select at least one user"));
        }

        let id = ConversationId::new_group();
        let photo = match &group.photo {
            Some(file) => Some(self.backend.blobs.upload(&BlobPath::image(), &file.data).await?),
            None => None,
        };

        let doc = ConversationDoc {
            messages: Vec::new(),
            kind: Some(ConversationKind::Group),
            group_name: Some(name.clone()),
            group_photo: photo.clone(),
            admin: Some(me),
            participants: participants.clone(),
            created_at: Some(Utc::now()),
        };
        self.backend.db.set(&DocPath::chat(&id), to_document(&doc)?)?;

        let info = json_value(&group_snapshot(&id, &name, photo.as_deref()))?;
        let last = json_value(&LastMessage {
            text: GROUP_CREATED_TEXT.to_string(),
        })?;
        for uid in &participants {
            self.backend.db.set_merge(
                &DocPath::user_chats(uid),
                &Patch::new()
                    .merge([id.as_str(), "userInfo"], info.clone())
                    .server_timestamp([id.as_str(), "date"])
                    .merge([id.as_str(), "lastMessage"], last.clone())
                    .set([id.as_str(), "unreadCount"], 0),
            )?;
        }

        tracing::info!(conversation = %id, members = participants.len(), "group created");
        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(id)
    }

    pub fn rename_group(&self, id: &ConversationId, name: &str) -> Result<()> {
        let result = self.rename_group_inner(id, name);
        self.report("rename_group", result)
    }

    fn rename_group_inner(&self, id: &ConversationId, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Group name cannot be empty"));
        }
        let group = self.load_group_as_admin(id)?;

        self.backend
            .db
            .update(&DocPath::chat(id), &Patch::new().set("groupName", name))?;

        let mut display = json!({ "displayName": name });
        if let Some(photo) = &group.group_photo {
            display["photoURL"] = json!(photo);
        }
        self.fan_out_display(id, &group.participants, display)?;
        self.refresh_selected_group(id, Some(name), None)?;

        tracing::info!(conversation = %id, "group renamed");
        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(())
    }

    /// Replace the group photo.  Returns the new photo URL.
    pub async fn update_group_photo(&self, id: &ConversationId, photo: Attachment) -> Result<String> {
        let result = self.update_group_photo_inner(id, photo).await;
        self.report("update_group_photo", result)
    }

    async fn update_group_photo_inner(&self, id: &ConversationId, photo: Attachment) -> Result<String> {
        let group = self.load_group_as_admin(id)?;
        let url = self
            .backend
            .blobs
            .upload(&BlobPath::group_photo(id), &photo.data)
            .await?;

        self.backend.db.update(
            &DocPath::chat(id),
            &Patch::new().set("groupPhoto", url.clone()),
        )?;

        let name = group
            .group_name
            .clone()
            .unwrap_or_else(|| UNNAMED_GROUP_NAME.to_string());
        self.fan_out_display(
            id,
            &group.participants,
            json!({ "displayName": name, "photoURL": url }),
        )?;
        self.refresh_selected_group(id, None, Some(&url))?;

        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(url)
    }

    /// Add members to a group.  Returns the uids that were actually new.
    pub fn add_group_members(&self, id: &ConversationId, members: &[UserId]) -> Result<Vec<UserId>> {
        let result = self.add_group_members_inner(id, members);
        self.report("add_group_members", result)
    }

    fn add_group_members_inner(&self, id: &ConversationId, members: &[UserId]) -> Result<Vec<UserId>> {
        if members.is_empty() {
            return Err(ClientError::validation("Please select at least one user"));
        }
        let group = self.load_group_as_admin(id)?;

        let mut added: Vec<UserId> = Vec::new();
        for uid in members {
            if !group.participants.contains(uid) && !added.contains(uid) {
                added.push(uid.clone());
            }
        }
        if added.is_empty() {
            return Ok(added);
        }

        let values = added
            .iter()
            .map(json_value)
            .collect::<Result<Vec<_>>>()?;
        self.backend.db.update(
            &DocPath::chat(id),
            &Patch::new().array_union("participants", values),
        )?;

        let name = group.group_name.as_deref().unwrap_or(UNNAMED_GROUP_NAME);
        let info = json_value(&group_snapshot(id, name, group.group_photo.as_deref()))?;
        for uid in &added {
            self.backend.db.set_merge(
                &DocPath::user_chats(uid),
                &Patch::new()
                    .merge([id.as_str(), "userInfo"], info.clone())
                    .server_timestamp([id.as_str(), "date"])
                    .set([id.as_str(), "unreadCount"], 0),
            )?;
        }

        tracing::info!(conversation = %id, added = added.len(), "group members added");
        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(added)
    }

    /// Leave a group.  Other members are not told; they see the shorter
    /// participant list on their next read.
    pub fn exit_group(&self, id: &ConversationId) -> Result<()> {
        let result = self.exit_group_inner(id);
        self.report("exit_group", result)
    }

    fn exit_group_inner(&self, id: &ConversationId) -> Result<()> {
        let session = self.session()?;
        self.load_group(id)?;

        self.backend.db.update(
            &DocPath::chat(id),
            &Patch::new().array_remove("participants", vec![json_value(session.uid())?]),
        )?;
        self.clear_index_entry(session.uid(), id)?;
        self.reset_if_selected(id)?;

        tracing::info!(conversation = %id, "left group");
        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(())
    }

    /// Delete a group for everyone.  Every current participant's index entry
    /// goes first, then the conversation itself.
    pub fn delete_group(&self, id: &ConversationId) -> Result<()> {
        let result = self.delete_group_inner(id);
        self.report("delete_group", result)
    }

    fn delete_group_inner(&self, id: &ConversationId) -> Result<()> {
        let group = self.load_group_as_admin(id)?;

        for uid in &group.participants {
            self.clear_index_entry(uid, id)?;
        }
        self.backend.db.delete(&DocPath::chat(id))?;
        self.reset_if_selected(id)?;

        tracing::info!(conversation = %id, members = group.participants.len(), "group deleted");
        self.events.emit(ClientEvent::GroupChanged {
            conversation_id: id.clone(),
        });
        Ok(())
    }

    /// The group's details with every participant's profile resolved.
    pub fn group_info(&self, id: &ConversationId) -> Result<GroupInfo> {
        let result = self.group_info_inner(id);
        self.report("group_info", result)
    }

    fn group_info_inner(&self, id: &ConversationId) -> Result<GroupInfo> {
        let group = self.load_group(id)?;
        let mut members = Vec::with_capacity(group.participants.len());
        for uid in &group.participants {
            let profile: Option<UserProfile> = self.backend.profile(uid)?;
            members.push(GroupMember {
                uid: uid.clone(),
                display_name: profile
                    .as_ref()
                    .map_or(UNKNOWN_USER_NAME, |p| p.display_name())
                    .to_string(),
                photo_url: profile.as_ref().and_then(|p| p.photo_url()).map(str::to_string),
                is_admin: group.is_admin(uid),
            });
        }

        Ok(GroupInfo {
            conversation_id: id.clone(),
            name: group
                .group_name
                .clone()
                .unwrap_or_else(|| UNNAMED_GROUP_NAME.to_string()),
            photo_url: group.group_photo.clone(),
            admin: group.admin.clone(),
            members,
            created_at: group.created_at,
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn load_group(&self, id: &ConversationId) -> Result<ConversationDoc> {
        let doc = self
            .backend
            .conversation(id)?
            .ok_or_else(|| ClientError::ConversationNotFound(id.to_string()))?;
        if !doc.is_group() {
            return Err(ClientError::NotAGroup(id.to_string()));
        }
        Ok(doc)
    }

    fn load_group_as_admin(&self, id: &ConversationId) -> Result<ConversationDoc> {
        let session = self.session()?;
        let doc = self.load_group(id)?;
        if !doc.is_admin(session.uid()) {
            return Err(ClientError::NotAdmin);
        }
        Ok(doc)
    }

    /// Merge display fields into each participant's `userInfo`, leaving the
    /// rest of their entry alone.
    fn fan_out_display(
        &self,
        id: &ConversationId,
        participants: &[UserId],
        display: serde_json::Value,
    ) -> Result<()> {
        for uid in participants {
            self.backend.db.set_merge(
                &DocPath::user_chats(uid),
                &Patch::new().merge([id.as_str(), "userInfo"], display.clone()),
            )?;
        }
        Ok(())
    }

    /// Remove `id` from `owner`'s chat index in both encodings.
    fn clear_index_entry(&self, owner: &UserId, id: &ConversationId) -> Result<()> {
        let mut patch = Patch::new().delete(id.as_str());
        for field in IndexField::ALL {
            patch = patch.delete(format!("{id}.{}", field.key()));
        }
        self.backend.db.set_merge(&DocPath::user_chats(owner), &patch)?;
        Ok(())
    }

    fn reset_if_selected(&self, id: &ConversationId) -> Result<()> {
        let selected = self
            .lock_state()?
            .selection()
            .is_some_and(|s| &s.conversation_id == id);
        if selected {
            self.reset_conversation()?;
        }
        Ok(())
    }

    /// Keep an open group's header in step with a rename or new photo.
    fn refresh_selected_group(&self, id: &ConversationId, name: Option<&str>, photo: Option<&str>) -> Result<()> {
        let mut state = self.lock_state()?;
        let Some(selection) = state.selection().filter(|s| &s.conversation_id == id).cloned() else {
            return Ok(());
        };
        let contact = Contact {
            display_name: name.map_or(selection.contact.display_name.clone(), str::to_string),
            photo_url: photo.map(str::to_string).or(selection.contact.photo_url.clone()),
            ..selection.contact
        };
        state.select_conversation(selection.conversation_id, contact);
        Ok(())
    }
}
