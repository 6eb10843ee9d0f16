//! Client operations.
//!
//! Each sub-module adds one group of methods to [`Client`](crate::Client).
//! Public methods report their failures on the event bus as
//! [`ClientEvent::Alert`](crate::ClientEvent::Alert) before returning them.

pub mod chats;
pub mod groups;
pub mod messaging;
pub mod session;
pub mod status;

use serde::Serialize;
use serde_json::Value;

use rjchat_shared::DocumentError;

use crate::error::Result;

/// Encode a value for a patch.
pub(crate) fn json_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value).map_err(DocumentError::from)?)
}
