//! Remote document-store client.
//!
//! `RemoteStore` implements both store seams against a Brewmix store server.
//!
//! ## Protocol
//!
//! 1. Catalog reads and beverage writes go over HTTP with bearer-key auth
//! 2. A live query opens a WebSocket and sends a `listen` frame
//! 3. The server confirms with `ready`, then pushes a `snapshot` frame with
//!    the full result set after every visible change
//! 4. Frames are JSON text messages

mod client;
mod protocol;

pub use client::{check_server, RemoteStore};
pub use protocol::{generate_client_id, WatchMessage};
