//! HTTP and WebSocket client for a Brewmix document-store server.
//!
//! One-shot reads and writes go over HTTP with bearer-key auth. Live queries
//! hold a single WebSocket per watch: the client sends a `listen` frame,
//! waits for the server's `ready`, then forwards every `snapshot` frame into
//! the watch channel until the socket closes or the watch is dropped.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::protocol::{generate_client_id, WatchMessage};
use crate::config::Config;
use crate::models::{Beverage, IngredientKind, IngredientOption};
use crate::store::{
    BeverageDocument, BeverageStore, BeverageWatch, CatalogReader, StoreError, StoredBeverage,
    BEVERAGES_COLLECTION,
};

/// Timeout for the listen/ready handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

type WsSender = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReceiver = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Client for a remote beverage document store.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    server_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl RemoteStore {
    /// Creates a client with explicit parameters.
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        match (&config.remote.server_url, &config.remote.api_key) {
            (Some(url), Some(key)) => Ok(Self::new(url.clone(), key.clone())),
            _ => Err(StoreError::NotConfigured),
        }
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Builds the WebSocket URL for the watch endpoint.
    fn build_ws_url(&self) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replace("http://", "ws://")
        } else if self.server_url.starts_with("https://") {
            self.server_url.replace("https://", "wss://")
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}/watch?key={}", base_url, self.api_key)
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        // Convert ws(s) to http(s) if needed
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replace("ws://", "http://")
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replace("wss://", "https://")
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CatalogReader for RemoteStore {
    async fn fetch_catalog(
        &self,
        kind: IngredientKind,
    ) -> Result<Vec<IngredientOption>, StoreError> {
        let url = self.build_http_url(&format!("/catalog/{}", kind.collection()));

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| StoreError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::HttpError(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<IngredientOption>>()
            .await
            .map_err(|e| StoreError::HttpError(e.to_string()))
    }
}

#[async_trait]
impl BeverageStore for RemoteStore {
    async fn save_beverage(&self, beverage: &Beverage) -> Result<(), StoreError> {
        let url = self.build_http_url(&format!("/{}/{}", BEVERAGES_COLLECTION, beverage.id));
        let document = BeverageDocument::from_beverage(beverage);

        let response = self
            .http
            .put(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&document)
            .send()
            .await
            .map_err(|e| StoreError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::HttpError(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn watch_beverages(&self, owner_id: &str) -> Result<BeverageWatch, StoreError> {
        let ws_url = self.build_ws_url();
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let (mut sender, mut receiver) = ws_stream.split();
        let client_id = generate_client_id();

        let listen = WatchMessage::Listen {
            client_id: client_id.clone(),
            collection: BEVERAGES_COLLECTION.to_string(),
            uid: owner_id.to_string(),
        };
        let encoded = listen
            .encode()
            .map_err(|e| StoreError::DecodeError(e.to_string()))?;
        sender
            .send(Message::Text(encoded.into()))
            .await
            .map_err(|e| StoreError::WebSocketError(e.to_string()))?;

        wait_for_ready(&mut receiver, &client_id).await?;
        tracing::debug!("watch established for {}", owner_id);

        let (tx, watch) = BeverageWatch::channel();
        let owner_id = owner_id.to_string();
        tokio::spawn(async move {
            run_watch(sender, receiver, tx, owner_id).await;
        });

        Ok(watch)
    }
}

/// Waits for the server's `ready` frame, enforcing the handshake timeout.
async fn wait_for_ready<R>(receiver: &mut R, client_id: &str) -> Result<(), StoreError>
where
    R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let ready = timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(msg_result) = receiver.next().await {
            match msg_result {
                Ok(Message::Text(data)) => {
                    let msg = WatchMessage::decode(&data)
                        .map_err(|e| StoreError::DecodeError(e.to_string()))?;

                    match msg {
                        WatchMessage::Ready { client_id: target } => {
                            if target != client_id {
                                return Err(StoreError::HandshakeError(
                                    "Ready frame client_id mismatch".to_string(),
                                ));
                            }
                            return Ok(());
                        }
                        WatchMessage::Error { message } => {
                            return Err(StoreError::HandshakeError(message));
                        }
                        _ => {
                            return Err(StoreError::HandshakeError(format!(
                                "Unexpected frame during handshake: {:?}",
                                msg
                            )));
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    return Err(StoreError::HandshakeError(
                        "Server closed connection during handshake".to_string(),
                    ));
                }
                Ok(_) => {
                    // Ignore other frame types
                }
                Err(e) => {
                    return Err(StoreError::WebSocketError(e.to_string()));
                }
            }
        }
        Err(StoreError::HandshakeError(
            "Connection closed before handshake completed".to_string(),
        ))
    })
    .await;

    match ready {
        Ok(result) => result,
        Err(_) => Err(StoreError::HandshakeTimeout),
    }
}

/// Forwards snapshot frames into the watch channel until the socket closes
/// or the watch is dropped.
async fn run_watch(
    mut sender: WsSender,
    mut receiver: WsReceiver,
    tx: mpsc::UnboundedSender<Vec<Beverage>>,
    owner_id: String,
) {
    loop {
        tokio::select! {
            message = receiver.next() => match message {
                Some(Ok(Message::Text(data))) => match WatchMessage::decode(&data) {
                    Ok(WatchMessage::Snapshot { documents }) => {
                        let beverages: Vec<Beverage> = documents
                            .into_iter()
                            .map(StoredBeverage::into_beverage)
                            .collect();
                        tracing::debug!(
                            "watch snapshot for {}: {} beverages",
                            owner_id,
                            beverages.len()
                        );
                        if tx.send(beverages).is_err() {
                            break;
                        }
                    }
                    Ok(WatchMessage::Error { message }) => {
                        tracing::warn!("watch error frame for {}: {}", owner_id, message);
                    }
                    Ok(_) => {
                        // Stray handshake frame, nothing to do
                    }
                    Err(e) => {
                        tracing::warn!("malformed watch frame for {}: {}", owner_id, e);
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Ignore other frame types
                }
                Some(Err(e)) => {
                    tracing::warn!("watch socket error for {}: {}", owner_id, e);
                    break;
                }
            },
            _ = tx.closed() => {
                // Watch dropped, close the connection
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
    tracing::debug!("watch ended for {}", owner_id);
}

/// Checks whether a store server is reachable at `url`.
///
/// Probes the `/health` endpoint with a short timeout. Any failure counts as
/// unreachable.
pub async fn check_server(url: &str) -> bool {
    let probe = RemoteStore::new(url, "");
    let health_url = probe.build_http_url("/health");

    let request = reqwest::Client::new().get(&health_url).send();
    match timeout(HEALTH_TIMEOUT, request).await {
        Ok(Ok(response)) => response.status().is_success(),
        _ => false,
    }
}
