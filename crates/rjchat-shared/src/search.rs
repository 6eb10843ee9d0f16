//! Selection between the active conversation list and directory search.

use serde::Serialize;

use crate::chat_index::{ChatSummary, Contact, UserDirectory};
use crate::types::UserId;

/// One row of the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SidebarItem {
    /// An existing conversation from the reconciled index.
    Chat(ChatSummary),
    /// A directory user matched by the search query.
    User(Contact),
}

impl SidebarItem {
    pub fn contact(&self) -> &Contact {
        match self {
            SidebarItem::Chat(summary) => &summary.contact,
            SidebarItem::User(contact) => contact,
        }
    }
}

/// Directory users (excluding `me`) whose display name contains `query`,
/// case-insensitively, ordered by display name.
pub fn search_directory(query: &str, me: &UserId, directory: &UserDirectory) -> Vec<Contact> {
    let needle = query.trim().to_lowercase();
    let mut hits: Vec<Contact> = directory
        .values()
        .filter(|p| &p.uid != me)
        .filter(|p| p.display_name().to_lowercase().contains(&needle))
        .map(Contact::from_profile)
        .collect();
    hits.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    hits
}

/// Rows to show: search results when the query is non-blank, otherwise the
/// active conversations in reconciled order.
pub fn sidebar_items(
    query: &str,
    me: &UserId,
    directory: &UserDirectory,
    reconciled: &[ChatSummary],
) -> Vec<SidebarItem> {
    if query.trim().is_empty() {
        reconciled
            .iter()
            .filter(|c| c.is_active())
            .cloned()
            .map(SidebarItem::Chat)
            .collect()
    } else {
        search_directory(query, me, directory)
            .into_iter()
            .map(SidebarItem::User)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::UserProfile;
    use crate::types::ConversationId;

    fn dir() -> UserDirectory {
        [("A1", "Alice"), ("B2", "bob"), ("C3", "Bobby Tables")]
            .into_iter()
            .map(|(uid, name)| {
                (
                    UserId::from(uid),
                    UserProfile {
                        uid: uid.into(),
                        name: Some(name.into()),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    fn summary(cid: &str, last: Option<&str>) -> ChatSummary {
        ChatSummary {
            conversation_id: ConversationId::from(cid),
            contact: Contact {
                id: cid.into(),
                display_name: cid.into(),
                photo_url: None,
                is_group: false,
            },
            last_message: last.map(str::to_string),
            unread_count: 0,
            last_activity: None,
        }
    }

    #[test]
    fn search_is_case_insensitive_and_excludes_self() {
        let hits = search_directory("BOB", &"A1".into(), &dir());
        let names: Vec<_> = hits.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, ["bob", "Bobby Tables"]);

        assert!(search_directory("alice", &"A1".into(), &dir()).is_empty());
    }

    #[test]
    fn blank_query_shows_active_list_only() {
        let reconciled = vec![summary("x", Some("hi")), summary("y", None)];
        let items = sidebar_items("   ", &"A1".into(), &dir(), &reconciled);
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], SidebarItem::Chat(c) if c.conversation_id.as_str() == "x"));
    }

    #[test]
    fn query_shows_directory_users() {
        let items = sidebar_items("ali", &"B2".into(), &dir(), &[]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].contact().id, "A1");
    }
}
