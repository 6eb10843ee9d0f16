//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so a client can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use rjchat_shared::constants::{DEFAULT_AVATAR_URL, MAX_FILE_SIZE, STORY_VIEW_DELAY_MS};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file backing the document store.
    /// Env: `RJCHAT_DB_PATH`
    /// Default: `None`, meaning the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Directory where blobs (avatars, images, files) are stored.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./blobs`
    pub blob_storage_path: PathBuf,

    /// Maximum size of one uploaded blob in bytes.
    /// Env: `MAX_BLOB_SIZE`
    /// Default: 50 MiB
    pub max_blob_size: usize,

    /// How long a story must stay on screen before a view receipt is written.
    /// Env: `STORY_VIEW_DELAY_MS`
    /// Default: `1000`
    pub story_view_delay: Duration,

    /// Avatar shown for users who never uploaded one.
    /// Env: `DEFAULT_AVATAR_URL`
    pub default_avatar_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            blob_storage_path: PathBuf::from("./blobs"),
            max_blob_size: MAX_FILE_SIZE,
            story_view_delay: Duration::from_millis(STORY_VIEW_DELAY_MS),
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        for key in [
            "RJCHAT_DB_PATH",
            "BLOB_STORAGE_PATH",
            "MAX_BLOB_SIZE",
            "STORY_VIEW_DELAY_MS",
            "DEFAULT_AVATAR_URL",
        ] {
            if let Ok(value) = std::env::var(key) {
                config.apply(key, &value);
            }
        }
        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.
        config
    }

    /// Apply one setting.  Invalid values are logged and ignored.
    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "RJCHAT_DB_PATH" if !value.is_empty() => self.db_path = Some(PathBuf::from(value)),
            "BLOB_STORAGE_PATH" if !value.is_empty() => {
                self.blob_storage_path = PathBuf::from(value)
            }
            "MAX_BLOB_SIZE" => match value.parse::<usize>() {
                Ok(n) if n > 0 => self.max_blob_size = n,
                _ => tracing::warn!(value, "Invalid MAX_BLOB_SIZE, using default"),
            },
            "STORY_VIEW_DELAY_MS" => match value.parse::<u64>() {
                Ok(ms) => self.story_view_delay = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value, "Invalid STORY_VIEW_DELAY_MS, using default"),
            },
            "DEFAULT_AVATAR_URL" if !value.is_empty() => {
                self.default_avatar_url = value.to_string()
            }
            _ => tracing::warn!(key, value, "Ignoring empty or unknown setting"),
        }
    }
}
