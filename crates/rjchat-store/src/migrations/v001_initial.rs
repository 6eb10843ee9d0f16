//! v001 -- Initial schema creation.
//!
//! Creates the `documents` table that backs every collection.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Documents (users, userChats, chats, statuses)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,                -- JSON object
    updated_at TEXT NOT NULL,                -- ISO-8601 / RFC-3339

    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
