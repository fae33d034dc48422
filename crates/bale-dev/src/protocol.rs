//! The hot-reload wire protocol.
//!
//! Typed messages over a persistent bidirectional channel to each client.
//! Patchable changes arrive as `update` with per-chunk payloads; anything
//! the client cannot apply in place downgrades to `full-reload`. A
//! reconnect after socket closure implies a full reload on the client
//! side, so nothing needs replaying.

use serde::{Deserialize, Serialize};

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Session start.
    Connected { timestamp: u64 },
    /// Patchable rebuild result.
    Update {
        timestamp: u64,
        updates: Vec<UpdateItem>,
    },
    /// The change cannot be patched in place.
    FullReload { timestamp: u64 },
    /// A rebuild failed; the previous emission is still being served.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },
}

/// One patched chunk inside an `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
    pub kind: UpdateKind,
    pub chunk_id: String,
    pub module_ids: Vec<String>,
    pub new_bytes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Js,
    Css,
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// The client applied an update successfully.
    HmrAck { update_timestamp: u64 },
}

/// Milliseconds since the Unix epoch; the protocol's timestamp unit.
pub fn now_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
