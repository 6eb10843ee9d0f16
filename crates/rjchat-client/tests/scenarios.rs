//! End-to-end flows with several clients sharing one backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use rjchat_client::{
    Attachment, Backend, Client, ClientConfig, ClientError, ClientEvent, Composer, Draft, NewGroup,
    NewStory, Registration, SendState,
};
use rjchat_shared::chat_index::ChatSummary;
use rjchat_shared::constants::{DEFAULT_ABOUT, IMAGE_SUMMARY_TEXT, STORY_TTL_SECS};
use rjchat_shared::documents::{MessageStatus, ReplyRef};
use rjchat_shared::search::SidebarItem;
use rjchat_shared::types::{ConversationId, UserId};
use rjchat_store::{AuthIdentity, BlobStore, Database, DocPath, Patch, StoreError};

struct World {
    _dir: tempfile::TempDir,
    backend: Backend,
}

impl World {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let blobs = BlobStore::new(dir.path().join("blobs"), 1024 * 1024)
            .await
            .unwrap();
        Self {
            _dir: dir,
            backend: Backend::new(Arc::new(db), Arc::new(blobs)),
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            story_view_delay: Duration::from_millis(20),
            ..Default::default()
        }
    }

    fn client(&self) -> Client {
        Client::new(self.backend.clone(), Self::config())
    }

    /// A user with a fixed uid, signed in on a fresh client.
    fn user(&self, uid: &str, name: &str) -> Client {
        let db = &self.backend.db;
        db.set(
            &DocPath::new("users", uid),
            json!({"uid": uid, "name": name, "email": format!("{uid}@example.com")})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        db.set(&DocPath::new("userChats", uid), Default::default()).unwrap();

        let client = self.client();
        client
            .handle_auth_change(Some(AuthIdentity {
                uid: uid.into(),
                email: format!("{uid}@example.com"),
            }))
            .unwrap();
        client
    }
}

fn entry(client: &Client, id: &ConversationId) -> Option<ChatSummary> {
    client
        .chat_list()
        .unwrap()
        .into_iter()
        .find(|c| &c.conversation_id == id)
}

fn start_chat(client: &Client, query: &str) -> ConversationId {
    let items = client.sidebar(query).unwrap();
    let item = items
        .iter()
        .find(|i| matches!(i, SidebarItem::User(_)))
        .expect("directory hit");
    client.select(item).unwrap()
}

fn png() -> Attachment {
    Attachment::new("photo.png", "image/png", &b"\x89PNG"[..])
}

fn pdf() -> Attachment {
    Attachment::new("notes.pdf", "application/pdf", &b"%PDF"[..])
}

#[tokio::test]
async fn a1_b2_send_and_read() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");

    let id = start_chat(&alice, "bob");
    assert_eq!(id.as_str(), "B2A1");

    // Nothing sent yet: listed in the index but not in the active list.
    assert!(entry(&bob, &id).is_some());
    assert!(bob.sidebar("").unwrap().is_empty());

    alice.send(Draft::text("hi")).await.unwrap();

    let theirs = entry(&bob, &id).unwrap();
    assert_eq!(theirs.unread_count, 1);
    assert_eq!(theirs.last_message.as_deref(), Some("hi"));
    assert_eq!(theirs.contact.display_name, "Alice");
    assert_eq!(entry(&alice, &id).unwrap().unread_count, 0);

    let row = bob.sidebar("").unwrap().remove(0);
    assert_eq!(bob.select(&row).unwrap(), id);
    let view = bob.open_conversation().unwrap();
    assert_eq!(view.conversation_id(), &id);

    assert_eq!(entry(&bob, &id).unwrap().unread_count, 0);
    let messages = alice.messages(&id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Seen);

    // Viewing again changes nothing.
    assert_eq!(bob.mark_seen(&id).unwrap(), 0);
    assert_eq!(entry(&bob, &id).unwrap().unread_count, 0);
    assert_eq!(alice.messages(&id).unwrap()[0].status, MessageStatus::Seen);
}

#[tokio::test]
async fn selecting_active_chat_keeps_conversation() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");

    let id = start_chat(&alice, "bob");
    alice.send(Draft::text("one")).await.unwrap();
    alice.send(Draft::text("two")).await.unwrap();
    let path = DocPath::chat(&id);
    let before = world.backend.db.get(&path).unwrap().unwrap();

    let row = bob.sidebar("").unwrap().remove(0);
    assert!(matches!(row, SidebarItem::Chat(_)));
    assert_eq!(bob.select(&row).unwrap(), id);
    assert_eq!(world.backend.db.get(&path).unwrap().unwrap(), before);

    // Reaching the same person through the directory does not reset it either.
    assert_eq!(start_chat(&bob, "alice"), id);
    assert_eq!(world.backend.db.get(&path).unwrap().unwrap(), before);
    assert_eq!(alice.messages(&id).unwrap().len(), 2);
}

#[tokio::test]
async fn own_messages_are_not_marked_seen() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let _bob = world.user("B2", "Bob");

    let id = start_chat(&alice, "bob");
    alice.send(Draft::text("hi")).await.unwrap();
    assert_eq!(alice.mark_seen(&id).unwrap(), 0);
    assert_eq!(alice.messages(&id).unwrap()[0].status, MessageStatus::Sent);
}

#[tokio::test]
async fn attachments_become_one_message_each() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");
    let id = start_chat(&alice, "bob");

    let reply = ReplyRef {
        id: "m0".into(),
        text: "earlier".into(),
        sender_name: Some("Bob".into()),
    };
    let draft = Draft::default()
        .with_attachment(png())
        .with_attachment(pdf())
        .with_attachment(png())
        .replying_to(reply.clone());

    let sent = alice.send(draft).await.unwrap();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m.text.is_empty()));
    assert_eq!(sent[0].reply_to, Some(reply));
    assert!(sent[1..].iter().all(|m| m.reply_to.is_none()));
    assert!(sent[0].img.is_some() && sent[0].file.is_none());
    assert_eq!(sent[1].file.as_ref().unwrap().name, "notes.pdf");
    assert_eq!(sent[1].file.as_ref().unwrap().content_type, "application/pdf");

    let stored = bob.messages(&id).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored, sent);

    // One send, one unread increment.
    let theirs = entry(&bob, &id).unwrap();
    assert_eq!(theirs.unread_count, 1);
    assert_eq!(theirs.last_message.as_deref(), Some(IMAGE_SUMMARY_TEXT));

    let url = sent[1].file.as_ref().unwrap().url.clone();
    assert_eq!(world.backend.blobs.download(&url).await.unwrap().as_ref(), b"%PDF");
}

#[tokio::test]
async fn text_with_attachment_rides_on_first_message() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");
    let id = start_chat(&alice, "bob");

    let sent = alice
        .send(Draft::text("look").with_attachment(png()).with_attachment(png()))
        .await
        .unwrap();
    assert_eq!(sent[0].text, "look");
    assert_eq!(sent[1].text, "");
    assert_eq!(entry(&bob, &id).unwrap().last_message.as_deref(), Some("look"));
}

#[tokio::test]
async fn empty_draft_is_rejected_without_writes() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let _bob = world.user("B2", "Bob");
    let id = start_chat(&alice, "bob");

    let mut events = alice.events().subscribe();
    let err = alice.send(Draft::text("   ")).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(alice.messages(&id).unwrap().is_empty());
    assert!(matches!(events.recv().await.unwrap(), ClientEvent::Alert { .. }));
}

#[tokio::test]
async fn failed_send_restores_the_draft() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");

    let mut composer = Composer::new();
    composer.set_text("hello");
    // Nothing selected, so the send fails after the input was cleared.
    let err = alice.send_draft(&mut composer).await.unwrap_err();
    assert!(matches!(err, ClientError::NoSelection));
    assert_eq!(composer.draft().text, "hello");
    assert!(matches!(composer.state(), SendState::Failed { .. }));
}

#[tokio::test]
async fn send_draft_confirms() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let _bob = world.user("B2", "Bob");
    start_chat(&alice, "bob");

    let mut composer = Composer::new();
    composer.set_text("hi");
    let sent = alice.send_draft(&mut composer).await.unwrap();
    assert!(composer.draft().is_empty());
    assert_eq!(
        composer.state(),
        &SendState::Confirmed {
            message_ids: vec![sent[0].id.clone()]
        }
    );
}

#[tokio::test]
async fn modern_entry_overrides_legacy_keys() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let _bob = world.user("B2", "Bob");

    world
        .backend
        .db
        .set_merge(
            &DocPath::new("userChats", "A1"),
            &Patch::new()
                .merge("B2A1.userInfo", json!({"uid": "B2", "displayName": "Bob"}))
                .merge("B2A1.lastMessage", json!({"text": "old"}))
                .set("B2A1.date", "2024-01-01T00:00:00Z")
                .merge(["B2A1", "lastMessage"], json!({"text": "new"})),
        )
        .unwrap();

    let list = alice.chat_list().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].last_message.as_deref(), Some("new"));
    assert_eq!(list[0].contact.display_name, "Bob");
}

#[tokio::test]
async fn chat_list_view_follows_index() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");

    let mut view = bob.chat_list_view().unwrap();
    assert!(view.summaries().is_empty());

    start_chat(&alice, "bob");
    alice.send(Draft::text("ping")).await.unwrap();

    assert!(view.changed().await);
    let rows = view.sidebar("");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].contact().display_name, "Alice");
    assert!(view.contacts().contains_key(&UserId::from("A1")));
}

#[tokio::test]
async fn conversation_view_marks_new_messages_seen() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");

    let id = start_chat(&alice, "bob");
    alice.send(Draft::text("one")).await.unwrap();
    let row = bob.sidebar("").unwrap().remove(0);
    bob.select(&row).unwrap();
    let mut view = bob.open_conversation().unwrap();

    alice.send(Draft::text("two")).await.unwrap();
    assert!(bob.follow_conversation(&mut view).await.unwrap());

    let messages = view.messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(alice
        .messages(&id)
        .unwrap()
        .iter()
        .all(|m| m.status == MessageStatus::Seen));
    assert_eq!(entry(&bob, &id).unwrap().unread_count, 0);
}

#[tokio::test]
async fn delete_only_own_messages() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");
    let bob = world.user("B2", "Bob");
    let id = start_chat(&alice, "bob");

    let mine = alice.send(Draft::text("mine")).await.unwrap();
    let theirs = bob.send_to(&id, Draft::text("theirs")).await.unwrap();

    let removed = alice
        .delete_messages(&id, &[mine[0].id.clone(), theirs[0].id.clone()])
        .unwrap();
    assert_eq!(removed, 1);
    let left = alice.messages(&id).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].text, "theirs");
    assert!(!alice.delete_message(&id, &theirs[0].id).unwrap());
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn group_entry(world: &World, uid: &str, id: &ConversationId) -> serde_json::Value {
    let doc = world
        .backend
        .db
        .get(&DocPath::new("userChats", uid))
        .unwrap()
        .unwrap_or_default();
    doc.get(id.as_str()).cloned().unwrap_or(serde_json::Value::Null)
}

#[tokio::test]
async fn group_create_rename_scenario() {
    let world = World::new().await;
    let p1 = world.user("P1", "Pat");
    let p2 = world.user("P2", "Quinn");
    let p3 = world.user("P3", "Rae");

    let id = p1
        .create_group(NewGroup {
            name: "Hikers".into(),
            members: vec!["P2".into(), "P3".into()],
            photo: None,
        })
        .await
        .unwrap();

    for uid in ["P1", "P2", "P3"] {
        let e = group_entry(&world, uid, &id);
        assert_eq!(e["userInfo"]["displayName"], "Hikers");
        assert_eq!(e["userInfo"]["isGroup"], true);
        assert_eq!(e["lastMessage"]["text"], "Group created");
    }

    p2.send_to(&id, Draft::text("hello all")).await.unwrap();
    assert_eq!(entry(&p1, &id).unwrap().unread_count, 1);
    assert_eq!(entry(&p3, &id).unwrap().unread_count, 1);
    assert_eq!(entry(&p2, &id).unwrap().unread_count, 0);

    p1.rename_group(&id, "Climbers").unwrap();
    for (client, unread) in [(&p1, 1), (&p2, 0), (&p3, 1)] {
        let e = entry(client, &id).unwrap();
        assert_eq!(e.contact.display_name, "Climbers");
        assert!(e.contact.is_group);
        assert_eq!(e.unread_count, unread);
        assert_eq!(e.last_message.as_deref(), Some("hello all"));
    }

    let err = p2.rename_group(&id, "Mine now").unwrap_err();
    assert!(matches!(err, ClientError::NotAdmin));

    let info = p3.group_info(&id).unwrap();
    assert_eq!(info.name, "Climbers");
    assert_eq!(info.members.len(), 3);
    assert!(info.members.iter().find(|m| m.uid.as_str() == "P1").unwrap().is_admin);
    assert_eq!(info.members[1].display_name, "Quinn");
}

#[tokio::test]
async fn group_validation_happens_before_writes() {
    let world = World::new().await;
    let p1 = world.user("P1", "Pat");

    let err = p1
        .create_group(NewGroup {
            name: "  ".into(),
            members: vec!["P2".into()],
            photo: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = p1
        .create_group(NewGroup {
            name: "Solo".into(),
            members: vec!["P1".into()],
            photo: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(world.backend.db.list("chats").unwrap().is_empty());
}

#[tokio::test]
async fn group_photo_updates_entries() {
    let world = World::new().await;
    let p1 = world.user("P1", "Pat");
    let p2 = world.user("P2", "Quinn");

    let id = p1
        .create_group(NewGroup {
            name: "Hikers".into(),
            members: vec!["P2".into()],
            photo: Some(png()),
        })
        .await
        .unwrap();

    let url = p1.update_group_photo(&id, png()).await.unwrap();
    assert_eq!(url, format!("blob:images/{id}"));
    let e = entry(&p2, &id).unwrap();
    assert_eq!(e.contact.photo_url.as_deref(), Some(url.as_str()));
    assert_eq!(e.contact.display_name, "Hikers");
}

#[tokio::test]
async fn group_delete_clears_every_member_including_late_joiners() {
    let world = World::new().await;
    let p1 = world.user("P1", "Pat");
    let p2 = world.user("P2", "Quinn");
    let p3 = world.user("P3", "Rae");

    let id = p1
        .create_group(NewGroup {
            name: "Hikers".into(),
            members: vec!["P2".into()],
            photo: None,
        })
        .await
        .unwrap();
    let added = p1
        .add_group_members(&id, &[UserId::from("P3"), UserId::from("P2")])
        .unwrap();
    assert_eq!(added, vec![UserId::from("P3")]);
    assert!(entry(&p3, &id).is_some());

    p3.send_to(&id, Draft::text("thanks for adding me")).await.unwrap();
    assert_eq!(entry(&p2, &id).unwrap().unread_count, 1);

    assert!(matches!(p2.delete_group(&id), Err(ClientError::NotAdmin)));

    p1.select_conversation(id.clone(), entry(&p1, &id).unwrap().contact).unwrap();
    p1.delete_group(&id).unwrap();

    for uid in ["P1", "P2", "P3"] {
        assert!(group_entry(&world, uid, &id).is_null());
    }
    assert!(world.backend.db.get(&DocPath::new("chats", id.as_str())).unwrap().is_none());
    assert!(p1.current_selection().is_none());
}

#[tokio::test]
async fn exiting_member_stops_receiving_updates() {
    let world = World::new().await;
    let p1 = world.user("P1", "Pat");
    let p2 = world.user("P2", "Quinn");
    let _p3 = world.user("P3", "Rae");

    let id = p1
        .create_group(NewGroup {
            name: "Hikers".into(),
            members: vec!["P2".into(), "P3".into()],
            photo: None,
        })
        .await
        .unwrap();

    p2.exit_group(&id).unwrap();
    assert!(entry(&p2, &id).is_none());
    let info = p1.group_info(&id).unwrap();
    assert_eq!(info.members.len(), 2);

    p1.send_to(&id, Draft::text("still here")).await.unwrap();
    assert!(group_entry(&world, "P2", &id).is_null());
}

// ---------------------------------------------------------------------------
// Session and profile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_sign_out_sign_in() {
    let world = World::new().await;
    let client = world.client();

    let profile = client
        .register(Registration {
            name: "Dana".into(),
            email: "dana@example.com".into(),
            password: "secret1".into(),
            avatar: Some(png()),
        })
        .await
        .unwrap();
    let uid = profile.uid.clone();
    assert_eq!(profile.avatar.as_deref(), Some(format!("blob:avatars/{uid}").as_str()));
    assert_eq!(profile.about.as_deref(), Some(DEFAULT_ABOUT));

    let session = client.current_session().unwrap();
    assert_eq!(session.display_name(), "Dana");
    assert!(world.backend.db.get(&DocPath::new("userChats", uid.as_str())).unwrap().is_some());

    client.sign_out().unwrap();
    assert!(client.current_session().is_none());

    let err = client.sign_in("dana@example.com", "wrong-one").unwrap_err();
    assert!(matches!(err, ClientError::Store(StoreError::InvalidCredentials)));

    let session = client.sign_in("dana@example.com", "secret1").unwrap();
    assert_eq!(session.uid(), &uid);
    assert_eq!(session.profile.unwrap().name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn profile_edits_persist() {
    let world = World::new().await;
    let alice = world.user("A1", "Alice");

    let profile = alice.update_profile("Alicia", "Out hiking").unwrap();
    assert_eq!(profile.name.as_deref(), Some("Alicia"));
    assert_eq!(profile.about.as_deref(), Some("Out hiking"));
    assert!(matches!(alice.update_profile(" ", "x"), Err(ClientError::Validation(_))));

    let url = alice.update_avatar(png()).await.unwrap();
    assert_eq!(url, "blob:avatars/A1");
    let session = alice.current_session().unwrap();
    assert_eq!(session.photo_url().as_deref(), Some("blob:avatars/A1"));
}

#[tokio::test]
async fn bootstrap_follows_auth_changes() {
    let world = World::new().await;
    let client = Arc::new(world.client());
    client
        .register(Registration {
            name: "Eve".into(),
            email: "eve@example.com".into(),
            password: "secret1".into(),
            avatar: None,
        })
        .await
        .unwrap();

    let task = client.spawn_session_bootstrap();
    let mut events = client.events().subscribe();

    client.auth().sign_out();
    loop {
        if let ClientEvent::SessionChanged { uid: None } = events.recv().await.unwrap() {
            break;
        }
    }
    assert!(client.current_session().is_none());

    client.auth().sign_in("eve@example.com", "secret1").unwrap();
    loop {
        if let ClientEvent::ProfileLoaded { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    assert_eq!(client.current_session().unwrap().display_name(), "Eve");
    task.abort();
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

async fn friends(world: &World) -> (Client, Client, Client) {
    let poster = world.user("A1", "Alice");
    let viewer = world.user("B2", "Bob");
    let stranger = world.user("C3", "Cy");
    start_chat(&poster, "bob");
    (poster, viewer, stranger)
}

#[tokio::test]
async fn stories_are_visible_to_contacts_only() {
    let world = World::new().await;
    let (poster, viewer, stranger) = friends(&world).await;

    let story = poster
        .post_story(NewStory {
            media: png(),
            caption: Some("summit".into()),
        })
        .await
        .unwrap();

    let feed = viewer.status_feed().unwrap();
    assert_eq!(feed.new.len(), 1);
    assert_eq!(feed.new[0].stories[0].id, story.id);
    assert_eq!(feed.new[0].user_info.display_name.as_deref(), Some("Alice"));
    assert!(stranger.status_feed().unwrap().new.is_empty());
    assert!(poster.status_feed().unwrap().new.is_empty());
    assert_eq!(poster.my_status().unwrap().unwrap().stories.len(), 1);

    assert!(viewer.record_story_view(&"A1".into(), &story.id).unwrap());
    assert!(!viewer.record_story_view(&"A1".into(), &story.id).unwrap());
    assert!(!poster.record_story_view(&"A1".into(), &story.id).unwrap());

    let feed = viewer.status_feed().unwrap();
    assert!(feed.new.is_empty());
    assert_eq!(feed.viewed.len(), 1);
    assert_eq!(feed.viewed[0].stories[0].viewers.len(), 1);
}

#[tokio::test]
async fn scheduled_view_is_recorded_unless_cancelled() {
    let world = World::new().await;
    let (poster, viewer, _) = friends(&world).await;
    let first = poster.post_story(NewStory { media: png(), caption: None }).await.unwrap();
    let second = poster.post_story(NewStory { media: png(), caption: None }).await.unwrap();

    // Moving on to the second story cancels the first receipt.
    viewer.schedule_story_view("A1".into(), first.id.clone()).unwrap();
    viewer.schedule_story_view("A1".into(), second.id.clone()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = poster.my_status().unwrap().unwrap();
    let by_id = |id: &str| status.stories.iter().find(|s| s.id == id).unwrap().clone();
    assert!(!by_id(&first.id).viewed_by(&"B2".into()));
    assert!(by_id(&second.id).viewed_by(&"B2".into()));

    viewer.schedule_story_view("A1".into(), first.id.clone()).unwrap();
    viewer.cancel_story_view();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = poster.my_status().unwrap().unwrap();
    assert!(status.stories.iter().all(|s| s.id != first.id || s.viewers.is_empty()));
}

#[tokio::test]
async fn delete_story_removes_blob() {
    let world = World::new().await;
    let (poster, _, _) = friends(&world).await;
    let story = poster.post_story(NewStory { media: png(), caption: None }).await.unwrap();

    assert!(poster.delete_story(&story.id).await.unwrap());
    assert!(!poster.delete_story(&story.id).await.unwrap());
    assert!(poster.my_status().unwrap().is_none());
    assert!(world.backend.blobs.download(&story.url).await.is_err());
}

#[tokio::test]
async fn delete_story_tolerates_missing_blob() {
    let world = World::new().await;
    let (poster, _, _) = friends(&world).await;
    let story = poster.post_story(NewStory { media: png(), caption: None }).await.unwrap();
    world.backend.blobs.delete(&story.url).await.unwrap();

    assert!(poster.delete_story(&story.id).await.unwrap());
    assert!(poster.my_status().unwrap().is_none());
}

#[tokio::test]
async fn posting_prunes_expired_stories() {
    let world = World::new().await;
    let (poster, viewer, _) = friends(&world).await;

    let old_url = world
        .backend
        .blobs
        .upload(&rjchat_store::BlobPath::image(), b"old")
        .await
        .unwrap();
    let old_ts = (chrono::Utc::now() - chrono::Duration::seconds(STORY_TTL_SECS + 60)).to_rfc3339();
    world
        .backend
        .db
        .set_merge(
            &DocPath::new("statuses", "A1"),
            &Patch::new()
                .merge("userInfo", json!({"uid": "A1", "displayName": "Alice"}))
                .array_union(
                    "stories",
                    vec![json!({"id": "old", "url": old_url, "type": "image", "timestamp": old_ts, "viewers": []})],
                ),
        )
        .unwrap();

    // Expired stories are invisible even before they are pruned.
    assert!(viewer.status_feed().unwrap().new.is_empty());

    poster.post_story(NewStory { media: png(), caption: None }).await.unwrap();
    let raw = world.backend.db.get(&DocPath::new("statuses", "A1")).unwrap().unwrap();
    let ids: Vec<_> = raw["stories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 1);
    assert_ne!(ids[0], "old");
    assert!(world.backend.blobs.download(&old_url).await.is_err());
}
