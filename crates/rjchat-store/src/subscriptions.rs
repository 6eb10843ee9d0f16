//! Live per-document subscriptions.
//!
//! Each subscribed [`DocPath`] owns one `watch` channel.  Writers publish the
//! committed state before releasing the connection, so a subscriber only
//! ever sees whole documents, in commit order, and at worst skips
//! intermediate versions.

use tokio::sync::watch;

use crate::database::Database;
use crate::documents::read_in;
use crate::error::{Result, StoreError};
use crate::models::{DocPath, Document};

/// Handle on the live state of one document.  Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    path: DocPath,
    rx: watch::Receiver<Option<Document>>,
}

impl Subscription {
    pub fn path(&self) -> &DocPath {
        &self.path
    }

    /// The latest state seen, `None` when the document does not exist.
    pub fn current(&self) -> Option<Document> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new state.
    ///
    /// Returns `None` only when the store itself has been dropped.
    pub async fn changed(&mut self) -> Option<Option<Document>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Database {
    /// Subscribe to `path`.  The handle starts with the current state.
    pub fn subscribe(&self, path: &DocPath) -> Result<Subscription> {
        // Holding the connection keeps writers out until the channel exists.
        let conn = self.conn()?;
        let current = read_in(&conn, path)?;
        let mut watchers = self.watchers.lock().map_err(|_| StoreError::Poisoned)?;

        let rx = match watchers.get(path) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(current);
                watchers.insert(path.clone(), tx);
                rx
            }
        };
        drop(watchers);
        drop(conn);

        tracing::debug!(path = %path, "subscribed");
        Ok(Subscription {
            path: path.clone(),
            rx,
        })
    }

    /// Publish the committed state of `path` to its subscribers.
    pub(crate) fn notify(&self, path: &DocPath, state: Option<Document>) {
        let Ok(mut watchers) = self.watchers.lock() else {
            tracing::warn!(path = %path, "watcher registry poisoned, change not published");
            return;
        };

        if let Some(tx) = watchers.get(path) {
            if tx.receiver_count() == 0 {
                watchers.remove(path);
            } else {
                tx.send_replace(state);
            }
        }
    }
}
