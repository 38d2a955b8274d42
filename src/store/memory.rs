//! In-process beverage store with live watches.
//!
//! Backs the session test-suite and embedded setups. Watches follow the same
//! contract as the remote store: the full current list on subscribe, then
//! another full list after every change to the owner's beverages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use super::document::{BeverageDocument, StoredBeverage};
use super::error::StoreError;
use super::{BeverageStore, BeverageWatch, CatalogReader};
use crate::models::{Beverage, IngredientKind, IngredientOption};

/// Shared-state in-memory backend implementing both store seams.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    catalogs: RwLock<HashMap<IngredientKind, Vec<IngredientOption>>>,
    /// Documents keyed by id. BTreeMap keeps iteration order stable.
    beverages: RwLock<BTreeMap<String, BeverageDocument>>,
    watchers: RwLock<Vec<Watcher>>,
}

#[derive(Debug)]
struct Watcher {
    owner_id: String,
    tx: mpsc::UnboundedSender<Vec<Beverage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the catalog for `kind`.
    pub async fn set_catalog(&self, kind: IngredientKind, options: Vec<IngredientOption>) {
        self.inner.catalogs.write().await.insert(kind, options);
    }

    /// Removes a beverage document and notifies the owner's watchers.
    /// Returns false when the id is unknown.
    pub async fn remove_beverage(&self, id: &str) -> bool {
        let removed = self.inner.beverages.write().await.remove(id);
        match removed {
            Some(document) => {
                self.notify(&document.uid).await;
                true
            }
            None => false,
        }
    }

    /// Current beverages owned by `owner_id`, in document-id order.
    pub async fn beverages_for(&self, owner_id: &str) -> Vec<Beverage> {
        let beverages = self.inner.beverages.read().await;
        owner_snapshot(&beverages, owner_id)
    }

    /// Sends the owner's current list to every watcher scoped to them.
    /// Watchers whose receiving end is gone are dropped here.
    async fn notify(&self, owner_id: &str) {
        let snapshot = self.beverages_for(owner_id).await;
        let mut watchers = self.inner.watchers.write().await;
        watchers.retain(|watcher| {
            if watcher.owner_id != owner_id {
                return true;
            }
            watcher.tx.send(snapshot.clone()).is_ok()
        });
    }
}

#[cfg(test)]
impl MemoryStore {
    async fn watcher_count(&self) -> usize {
        self.inner.watchers.read().await.len()
    }
}

#[async_trait]
impl CatalogReader for MemoryStore {
    async fn fetch_catalog(
        &self,
        kind: IngredientKind,
    ) -> Result<Vec<IngredientOption>, StoreError> {
        let catalogs = self.inner.catalogs.read().await;
        Ok(catalogs.get(&kind).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl BeverageStore for MemoryStore {
    async fn save_beverage(&self, beverage: &Beverage) -> Result<(), StoreError> {
        let stored = StoredBeverage::from_beverage(beverage);
        self.inner
            .beverages
            .write()
            .await
            .insert(stored.id, stored.document);
        self.notify(&beverage.owner_id).await;
        Ok(())
    }

    async fn watch_beverages(&self, owner_id: &str) -> Result<BeverageWatch, StoreError> {
        let (tx, watch) = BeverageWatch::channel();
        let beverages = self.inner.beverages.read().await;
        let initial = owner_snapshot(&beverages, owner_id);
        // Registration happens under the documents lock, so a save cannot
        // land between the initial snapshot and the first notification
        let mut watchers = self.inner.watchers.write().await;
        // Send failure here only means the watch was dropped already
        let _ = tx.send(initial);
        watchers.push(Watcher {
            owner_id: owner_id.to_string(),
            tx,
        });
        Ok(watch)
    }
}

/// Materializes the owner's documents, in id order.
fn owner_snapshot(
    beverages: &BTreeMap<String, BeverageDocument>,
    owner_id: &str,
) -> Vec<Beverage> {
    beverages
        .iter()
        .filter(|(_, document)| document.uid == owner_id)
        .map(|(id, document)| document.clone().into_beverage(id.clone()))
        .collect()
}
