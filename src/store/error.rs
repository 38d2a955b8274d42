//! Store error types.

/// Errors that can occur talking to a beverage document store.
#[derive(Debug)]
pub enum StoreError {
    /// Remote store is not configured
    NotConfigured,
    /// HTTP request failed
    HttpError(String),
    /// Failed to connect to server
    ConnectionError(String),
    /// WebSocket error
    WebSocketError(String),
    /// Handshake failed
    HandshakeError(String),
    /// Handshake timeout
    HandshakeTimeout,
    /// JSON encoding/decoding error
    DecodeError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotConfigured => {
                write!(
                    f,
                    "Remote store not configured. Add server_url and api_key to config."
                )
            }
            StoreError::HttpError(e) => write!(f, "HTTP error: {}", e),
            StoreError::ConnectionError(e) => write!(f, "Connection error: {}", e),
            StoreError::WebSocketError(e) => write!(f, "WebSocket error: {}", e),
            StoreError::HandshakeError(e) => write!(f, "Handshake failed: {}", e),
            StoreError::HandshakeTimeout => write!(f, "Handshake timed out"),
            StoreError::DecodeError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}
