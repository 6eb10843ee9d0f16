//! Story visibility.
//!
//! Stories are never deleted on a schedule.  Expiry is evaluated on every
//! read against the caller's clock, so an expired story simply stops showing
//! up until the poster deletes it or a later post prunes it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::chat_index::{ChatSummary, Contact};
use crate::constants::{FALLBACK_USER_NAME, STORY_TTL_SECS};
use crate::documents::{StatusDoc, Story};
use crate::types::UserId;

pub fn story_ttl() -> Duration {
    Duration::seconds(STORY_TTL_SECS)
}

/// A story is active while strictly younger than 24 hours.
pub fn is_active(story: &Story, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(story.timestamp) < story_ttl()
}

pub fn active_stories(stories: &[Story], now: DateTime<Utc>) -> Vec<Story> {
    stories.iter().filter(|s| is_active(s, now)).cloned().collect()
}

/// Return `doc` with only its active stories, or `None` when nothing is left.
pub fn visible_status(doc: &StatusDoc, now: DateTime<Utc>) -> Option<StatusDoc> {
    let stories = active_stories(&doc.stories, now);
    if stories.is_empty() {
        return None;
    }
    Some(StatusDoc {
        user_info: doc.user_info.clone(),
        last_updated: doc.last_updated,
        stories,
    })
}

/// The viewer's contact set: every 1:1 counterpart in the reconciled index.
pub fn contact_set(reconciled: &[ChatSummary], me: &UserId) -> HashMap<UserId, Contact> {
    reconciled
        .iter()
        .filter_map(|c| c.contact.user_id().map(|uid| (uid, c.contact.clone())))
        .filter(|(uid, _)| uid != me)
        .collect()
}

/// Status lists for one viewer, split for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFeed {
    /// Posters with at least one active story the viewer has not seen.
    pub new: Vec<StatusDoc>,
    /// Posters whose active stories the viewer has all seen.
    pub viewed: Vec<StatusDoc>,
}

/// Build the viewer's feed from every status document in the store.
pub fn build_feed(
    docs: &[StatusDoc],
    me: &UserId,
    contacts: &HashMap<UserId, Contact>,
    now: DateTime<Utc>,
) -> StatusFeed {
    let mut visible: Vec<StatusDoc> = docs
        .iter()
        .filter(|d| &d.user_info.uid != me)
        .filter_map(|d| {
            let contact = contacts.get(&d.user_info.uid)?;
            let mut doc = visible_status(d, now)?;
            // The contact's live identity is more reliable than the snapshot
            // the poster wrote.
            doc.user_info.display_name = Some(contact.display_name.clone())
                .filter(|n| !n.is_empty())
                .or(doc.user_info.display_name)
                .or_else(|| Some(FALLBACK_USER_NAME.to_string()));
            doc.user_info.photo_url = contact.photo_url.clone().or(doc.user_info.photo_url);
            Some(doc)
        })
        .collect();

    visible.sort_by(|a, b| {
        b.last_updated
            .cmp(&a.last_updated)
            .then_with(|| a.user_info.uid.cmp(&b.user_info.uid))
    });

    let (viewed, new): (Vec<_>, Vec<_>) = visible
        .into_iter()
        .partition(|doc| doc.stories.iter().all(|s| s.viewed_by(me)));

    StatusFeed { new, viewed }
}
