//! # rjchat-client
//!
//! The Rj Chat application layer: session bootstrap, the conversation list,
//! sending and reading messages, group management and status stories, all
//! built on the document store, blob store and auth provider from
//! `rjchat-store`.

pub mod backend;
pub mod commands;
pub mod compose;
pub mod config;
pub mod error;
pub mod events;
pub mod state;
pub mod views;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

use rjchat_store::AuthProvider;

pub use crate::backend::Backend;
pub use crate::commands::groups::{GroupInfo, GroupMember, NewGroup};
pub use crate::commands::session::Registration;
pub use crate::commands::status::NewStory;
pub use crate::compose::{Attachment, Composer, Draft, SendState};
pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, Result};
pub use crate::events::{ClientEvent, EventBus};
pub use crate::state::{AppState, Selection, Session};
pub use crate::views::{ChatListView, ConversationView};

/// Install the global tracing subscriber.  Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rjchat_client=debug,rjchat_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting Rj Chat client");
    }
}

/// One signed-in (or signed-out) user of the chat service.
pub struct Client {
    backend: Backend,
    auth: AuthProvider,
    state: Arc<Mutex<AppState>>,
    events: EventBus,
    config: ClientConfig,
    /// Pending story-view receipt, cancelled when the viewer moves on.
    story_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Open the backend described by `config` and build a client on it.
    pub async fn open(config: ClientConfig) -> Result<Self> {
        let backend = Backend::open(&config).await?;
        Ok(Self::new(backend, config))
    }

    pub fn new(backend: Backend, config: ClientConfig) -> Self {
        Self::with_state(backend, config, Arc::new(Mutex::new(AppState::new())))
    }

    /// Build a client around an existing state container.
    pub fn with_state(backend: Backend, config: ClientConfig, state: Arc<Mutex<AppState>>) -> Self {
        let auth = AuthProvider::new(backend.db.clone());
        Self {
            backend,
            auth,
            state,
            events: EventBus::new(),
            config,
            story_timer: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> Arc<Mutex<AppState>> {
        self.state.clone()
    }

    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, AppState>> {
        self.state.lock().map_err(|_| ClientError::StatePoisoned)
    }

    /// Snapshot of the signed-in session.
    pub(crate) fn session(&self) -> Result<Session> {
        self.lock_state()?
            .session()
            .cloned()
            .ok_or(ClientError::NotSignedIn)
    }

    pub(crate) fn selection(&self) -> Result<Selection> {
        self.lock_state()?
            .selection()
            .cloned()
            .ok_or(ClientError::NoSelection)
    }

    /// Publish a failed operation as an alert and pass the result through.
    pub(crate) fn report<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!(operation, error = %e, "Operation failed");
            self.events.emit(ClientEvent::Alert {
                operation: operation.to_string(),
                message: e.to_string(),
            });
        }
        result
    }
}
