//! # rjchat-store
//!
//! The backend collaborators of the Rj Chat client: a schemaless document
//! store with field-level patch writes and per-document subscriptions, a
//! filesystem blob store, and an account/session provider.
//!
//! Documents live as JSON in a single SQLite table.  Each write runs inside
//! its own transaction, so every [`Patch`] is atomic per document, which is
//! all the consistency the client relies on.

pub mod auth;
pub mod blobs;
pub mod database;
pub mod documents;
pub mod migrations;
pub mod models;
pub mod patch;
pub mod subscriptions;

mod error;

pub use auth::AuthProvider;
pub use blobs::{BlobPath, BlobStore};
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use patch::{FieldOp, FieldPath, Patch};
pub use subscriptions::Subscription;
