//! Store seams for ingredient catalogs and saved beverages.
//!
//! `CatalogReader` and `BeverageStore` are the injection points between a
//! session and whatever backs it: `RemoteStore` against a document-store
//! server in production, `MemoryStore` in tests and embedded setups.
//!
//! ## Watch contract
//!
//! A `BeverageWatch` carries full snapshots, never deltas: the complete
//! current list of the owner's beverages arrives once on subscribe and again
//! after every visible change. Dropping the watch detaches the listener.

mod document;
mod error;
mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::{Beverage, IngredientKind, IngredientOption};

pub use document::{BeverageDocument, StoredBeverage, BEVERAGES_COLLECTION};
pub use error::StoreError;
pub use memory::MemoryStore;

/// One-shot reader for ingredient catalogs.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Fetches every option in the catalog for `kind`, in store order.
    async fn fetch_catalog(
        &self,
        kind: IngredientKind,
    ) -> Result<Vec<IngredientOption>, StoreError>;
}

/// Durable writes and live queries over saved beverages.
#[async_trait]
pub trait BeverageStore: Send + Sync {
    /// Upserts the beverage's document under its id.
    async fn save_beverage(&self, beverage: &Beverage) -> Result<(), StoreError>;

    /// Starts a live query over the owner's beverages.
    async fn watch_beverages(&self, owner_id: &str) -> Result<BeverageWatch, StoreError>;
}

/// Live feed of beverage snapshots for one owner.
///
/// Dropping the watch ends the subscription; backends observe the closed
/// channel and stop delivering.
#[derive(Debug)]
pub struct BeverageWatch {
    snapshots: mpsc::UnboundedReceiver<Vec<Beverage>>,
}

impl BeverageWatch {
    /// Wraps a snapshot channel whose sender half a backend feeds.
    pub fn new(snapshots: mpsc::UnboundedReceiver<Vec<Beverage>>) -> Self {
        Self { snapshots }
    }

    /// Creates a connected sender/watch pair for a backend.
    pub fn channel() -> (mpsc::UnboundedSender<Vec<Beverage>>, BeverageWatch) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, BeverageWatch::new(rx))
    }

    /// Waits for the next snapshot. Returns `None` once the backend has
    /// stopped feeding the watch.
    pub async fn next(&mut self) -> Option<Vec<Beverage>> {
        self.snapshots.recv().await
    }
}
