//! Protocol types for the document-store watch channel.
//!
//! Frames are JSON text messages. Field names use camelCase on the wire to
//! match the server.
//!
//! ## Flow
//!
//! 1. Client connects and sends `listen` with a fresh client ID
//! 2. Server confirms with `ready` addressed to that client ID
//! 3. Server pushes a `snapshot` frame with the full result set after every
//!    visible change (including one immediately after `ready`)

use serde::{Deserialize, Serialize};

use crate::store::StoredBeverage;

/// Message types for the watch protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WatchMessage {
    /// Listen request - sent by client to start a live query
    #[serde(rename = "listen")]
    Listen {
        #[serde(rename = "clientId")]
        client_id: String,
        collection: String,
        uid: String,
    },
    /// Ready - sent by server to confirm the live query
    #[serde(rename = "ready")]
    Ready {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    /// Snapshot - full result set for the live query
    #[serde(rename = "snapshot")]
    Snapshot { documents: Vec<StoredBeverage> },
    /// Error message from server
    #[serde(rename = "error")]
    Error { message: String },
}

impl WatchMessage {
    /// Encode message as a JSON string.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode message from a JSON string.
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Generate a random client ID for one watch connection.
pub fn generate_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
