//! Point reads and writes on JSON documents.
//!
//! Every write is one SQLite transaction: read the current body, apply the
//! change, write it back, commit, then push the new state to any
//! [`Subscription`](crate::Subscription) on that document while the
//! connection is still held.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{DocPath, Document};
use crate::patch::Patch;

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single document.
    pub fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        read_in(&*self.conn()?, path)
    }

    /// Fetch every document of a collection, ordered by id.
    pub fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents
             WHERE collection = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            docs.push((id, decode(&body)?));
        }
        Ok(docs)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Overwrite (or create) a document.
    pub fn set(&self, path: &DocPath, doc: Document) -> Result<()> {
        self.write(path, |_| Ok((Outcome::Put(doc), ())))?;
        tracing::debug!(path = %path, "document set");
        Ok(())
    }

    /// Apply `patch`, creating the document first when it does not exist.
    pub fn set_merge(&self, path: &DocPath, patch: &Patch) -> Result<Document> {
        let now = Utc::now();
        let doc = self.write(path, |current| {
            let mut doc = current.unwrap_or_default();
            patch.apply(&mut doc, now);
            Ok((Outcome::Put(doc.clone()), doc))
        })?;
        tracing::debug!(path = %path, ops = patch.ops().len(), "document merged");
        Ok(doc)
    }

    /// Apply `patch` to an existing document.
    pub fn update(&self, path: &DocPath, patch: &Patch) -> Result<Document> {
        let now = Utc::now();
        let doc = self.write(path, |current| {
            let mut doc = current.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            patch.apply(&mut doc, now);
            Ok((Outcome::Put(doc.clone()), doc))
        })?;
        tracing::debug!(path = %path, ops = patch.ops().len(), "document updated");
        Ok(doc)
    }

    /// Edit an existing document in place, atomically.
    ///
    /// Returns `None` without calling `f` when the document does not exist.
    /// Nothing is written, and subscribers are not woken, when `f` leaves
    /// the document unchanged.
    pub fn update_with<T, F>(&self, path: &DocPath, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Document) -> Result<T>,
    {
        self.write(path, |current| {
            let Some(before) = current else {
                return Ok((Outcome::Keep, None));
            };
            let mut doc = before.clone();
            let value = f(&mut doc)?;
            let outcome = if doc == before {
                Outcome::Keep
            } else {
                Outcome::Put(doc)
            };
            Ok((outcome, Some(value)))
        })
    }

    /// Delete a document.  Returns `true` if it existed.
    pub fn delete(&self, path: &DocPath) -> Result<bool> {
        let existed = self.write(path, |current| match current {
            Some(_) => Ok((Outcome::Remove, true)),
            None => Ok((Outcome::Keep, false)),
        })?;
        tracing::debug!(path = %path, existed, "document deleted");
        Ok(existed)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Read-modify-write one document inside a transaction.
    ///
    /// Subscribers are notified before the connection is released, so they
    /// observe writes in commit order.
    fn write<T, F>(&self, path: &DocPath, f: F) -> Result<T>
    where
        F: FnOnce(Option<Document>) -> Result<(Outcome, T)>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = read_in(&tx, path)?;
        let (outcome, value) = f(current)?;

        let next = match outcome {
            Outcome::Keep => return Ok(value),
            Outcome::Put(doc) => {
                tx.execute(
                    "INSERT INTO documents (collection, id, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(collection, id) DO UPDATE
                     SET body = excluded.body, updated_at = excluded.updated_at",
                    params![
                        path.collection,
                        path.id,
                        serde_json::to_string(&doc)?,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Some(doc)
            }
            Outcome::Remove => {
                tx.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![path.collection, path.id],
                )?;
                None
            }
        };
        tx.commit()?;

        self.notify(path, next);
        drop(conn);
        Ok(value)
    }
}

/// What a write does to the stored document.
enum Outcome {
    Keep,
    Put(Document),
    Remove,
}

pub(crate) fn read_in(conn: &Connection, path: &DocPath) -> Result<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.collection, path.id],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|b| decode(&b)).transpose()
}

fn decode(body: &str) -> Result<Document> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn set_get_delete() {
        let db = Database::open_in_memory().unwrap();
        let path = DocPath::new("chats", "c1");

        assert!(db.get(&path).unwrap().is_none());
        db.set(&path, doc(json!({"messages": []}))).unwrap();
        assert_eq!(db.get(&path).unwrap().unwrap(), doc(json!({"messages": []})));

        assert!(db.delete(&path).unwrap());
        assert!(!db.delete(&path).unwrap());
        assert!(db.get(&path).unwrap().is_none());
    }

    #[test]
    fn update_requires_existing_document() {
        let db = Database::open_in_memory().unwrap();
        let path = DocPath::new("chats", "missing");
        let err = db.update(&path, &Patch::new().set("a", 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn update_with_edits_existing_documents_only() {
        let db = Database::open_in_memory().unwrap();
        let path = DocPath::new("chats", "c1");
        assert_eq!(db.update_with(&path, |_| Ok(1)).unwrap(), None);
        assert!(db.get(&path).unwrap().is_none());

        db.set(&path, doc(json!({"messages": [1, 2, 3]}))).unwrap();
        let removed = db
            .update_with(&path, |d| {
                let messages = d.get_mut("messages").and_then(|m| m.as_array_mut()).unwrap();
                messages.retain(|m| m != &json!(2));
                Ok(1)
            })
            .unwrap();
        assert_eq!(removed, Some(1));
        assert_eq!(db.get(&path).unwrap().unwrap(), doc(json!({"messages": [1, 3]})));
    }

    #[test]
    fn set_merge_creates_then_merges() {
        let db = Database::open_in_memory().unwrap();
        let path = DocPath::new("userChats", "u1");

        db.set_merge(&path, &Patch::new().merge("c1", json!({"userInfo": {"uid": "u2"}})))
            .unwrap();
        let out = db
            .set_merge(&path, &Patch::new().increment(["c1", "unreadCount"], 1))
            .unwrap();
        assert_eq!(out, doc(json!({"c1": {"userInfo": {"uid": "u2"}, "unreadCount": 1}})));
    }

    #[test]
    fn list_returns_collection_in_id_order() {
        let db = Database::open_in_memory().unwrap();
        db.set(&DocPath::new("users", "b"), doc(json!({"uid": "b"}))).unwrap();
        db.set(&DocPath::new("users", "a"), doc(json!({"uid": "a"}))).unwrap();
        db.set(&DocPath::new("chats", "x"), doc(json!({}))).unwrap();

        let ids: Vec<_> = db.list("users").unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.set(&DocPath::new("users", "a"), doc(json!({"name": "Ann"}))).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.get(&DocPath::new("users", "a")).unwrap().unwrap(),
            doc(json!({"name": "Ann"}))
        );
    }
}
