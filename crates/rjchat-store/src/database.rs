//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.  The connection sits behind
//! a mutex so one handle can be shared (`Arc<Database>`) by every client
//! session in the process; each write locks it for the duration of its
//! transaction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use directories::ProjectDirs;
use rusqlite::Connection;
use tokio::sync::watch;

use crate::error::{Result, StoreError};
use crate::migrations;
use crate::models::{DocPath, Document};

/// Wrapper around a [`rusqlite::Connection`] plus the live document watchers.
pub struct Database {
    conn: Mutex<Connection>,
    pub(crate) watchers: Mutex<HashMap<DocPath, watch::Sender<Option<Document>>>>,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/rjchat/rjchat.db`
    /// - macOS:   `~/Library/Application Support/com.rjchat.rjchat/rjchat.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\rjchat\rjchat\data\rjchat.db`
    pub fn new() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "rjchat", "rjchat").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("rjchat.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database.  Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            watchers: Mutex::new(HashMap::new()),
        })
    }

    /// Lock the underlying connection.
    ///
    /// Callers should prefer the typed helpers, but direct access is
    /// occasionally needed for ad-hoc queries.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn()
            .ok()
            .and_then(|c| c.path().filter(|p| !p.is_empty()).map(PathBuf::from))
    }
}
