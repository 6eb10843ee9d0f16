//! # rjchat-shared
//!
//! Identifiers, document shapes and the pure reconciliation rules shared by
//! the store and the client.  Nothing in this crate performs I/O: every
//! function takes plain documents in and hands plain values back, so the
//! same rules apply whether the documents came from a point read or a
//! subscription push.

pub mod chat_index;
pub mod constants;
pub mod documents;
pub mod error;
pub mod search;
pub mod stories;
pub mod types;

pub use error::DocumentError;
