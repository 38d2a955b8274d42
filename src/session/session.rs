//! Beverage session: auth-scoped state over injected store seams.
//!
//! The session keeps a `SessionState` snapshot behind a lock, publishes every
//! change through a `watch` channel, and holds at most one live beverage
//! subscription. Changing users always detaches the old subscription before
//! touching anything else, so a stale owner's snapshot can never land in the
//! new owner's state.

use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use super::state::{SessionState, MSG_INCOMPLETE, MSG_NO_USER};
use crate::models::{Beverage, IngredientKind, IngredientOption, User};
use crate::store::{BeverageStore, BeverageWatch, CatalogReader, StoreError};

/// Errors surfaced by session operations.
///
/// Validation failures are not errors; they only set the status message.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A catalog failed to load during initialization.
    #[error("failed to load {kind} catalog: {source}")]
    Catalog {
        kind: IngredientKind,
        source: StoreError,
    },
    /// The beverage subscription could not be established.
    #[error("failed to subscribe to beverages: {source}")]
    Subscribe { source: StoreError },
}

/// Client-side beverage builder session.
///
/// Cloning yields another handle to the same session. Dropping the last
/// handle tears down the active subscription.
#[derive(Clone)]
pub struct BeverageSession {
    catalogs: Arc<dyn CatalogReader>,
    store: Arc<dyn BeverageStore>,
    shared: Arc<Shared>,
}

struct Shared {
    state: RwLock<SessionState>,
    changed: watch::Sender<SessionState>,
    /// Forwarding task of the active subscription. Aborted on user change
    /// and when the last session handle drops.
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn publish(&self, state: &SessionState) {
        self.changed.send_replace(state.clone());
    }

    fn detach_subscription(&self) {
        if let Ok(mut guard) = self.subscription.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.detach_subscription();
    }
}

impl BeverageSession {
    /// Creates a logged-out session with the given collaborators and serving
    /// temperature menu.
    pub fn new(
        catalogs: Arc<dyn CatalogReader>,
        store: Arc<dyn BeverageStore>,
        temperatures: Vec<String>,
    ) -> Self {
        let state = SessionState::new(temperatures);
        let (changed, _) = watch::channel(state.clone());
        Self {
            catalogs,
            store,
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                changed,
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Creates a session over a single backend implementing both seams.
    pub fn with_store<S>(store: Arc<S>, temperatures: Vec<String>) -> Self
    where
        S: CatalogReader + BeverageStore + 'static,
    {
        Self::new(store.clone(), store, temperatures)
    }

    /// Returns a clone of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.shared.state.read().await.clone()
    }

    /// Subscribes to state changes. The receiver's payload is always the
    /// latest snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.shared.changed.subscribe()
    }

    /// Loads the three ingredient catalogs and defaults every selection to
    /// its list's first entry.
    ///
    /// Catalogs are fetched concurrently. Any failure aborts initialization
    /// and leaves the previous state untouched; there is no partial success.
    pub async fn init(&self) -> Result<(), SessionError> {
        let (bases, syrups, creamers) = tokio::try_join!(
            self.fetch_catalog(IngredientKind::Base),
            self.fetch_catalog(IngredientKind::Syrup),
            self.fetch_catalog(IngredientKind::Creamer),
        )?;

        let mut state = self.shared.state.write().await;
        state.current_base = bases.first().cloned();
        state.current_syrup = syrups.first().cloned();
        state.current_creamer = creamers.first().cloned();
        state.current_temperature = state.temperatures.first().cloned();
        state.bases = bases;
        state.syrups = syrups;
        state.creamers = creamers;
        self.shared.publish(&state);
        Ok(())
    }

    async fn fetch_catalog(
        &self,
        kind: IngredientKind,
    ) -> Result<Vec<IngredientOption>, SessionError> {
        self.catalogs
            .fetch_catalog(kind)
            .await
            .map_err(|source| SessionError::Catalog { kind, source })
    }

    /// Signs a user in or out.
    ///
    /// The previous subscription is always detached first, so no snapshot
    /// from the old owner can land after this call returns. Signing in
    /// clears the beverage list and establishes a new watch scoped to the
    /// user; if the watch cannot be established the session reverts to
    /// signed out and the error propagates. Repeated calls with the same
    /// identity simply re-subscribe.
    pub async fn set_user(&self, user: Option<User>) -> Result<(), SessionError> {
        self.shared.detach_subscription();

        let Some(user) = user else {
            let mut state = self.shared.state.write().await;
            state.user = None;
            state.beverages.clear();
            state.current_beverage = None;
            state.message = None;
            self.shared.publish(&state);
            tracing::info!("user signed out");
            return Ok(());
        };

        let uid = user.uid.clone();
        {
            let mut state = self.shared.state.write().await;
            state.user = Some(user);
            state.beverages.clear();
            state.current_beverage = None;
            state.message = None;
            self.shared.publish(&state);
        }
        tracing::info!("user signed in: {}", uid);

        let beverage_watch = match self.store.watch_beverages(&uid).await {
            Ok(beverage_watch) => beverage_watch,
            Err(source) => {
                // A signed-in session always has a live watch, so revert
                let mut state = self.shared.state.write().await;
                state.user = None;
                self.shared.publish(&state);
                return Err(SessionError::Subscribe { source });
            }
        };

        let handle = spawn_forwarder(Arc::downgrade(&self.shared), beverage_watch);
        if let Ok(mut guard) = self.shared.subscription.lock() {
            if let Some(old) = guard.replace(handle) {
                old.abort();
            }
        }
        Ok(())
    }

    /// Builds and saves a beverage from the current selections.
    ///
    /// Returns the status message, which is also stored in the state. The
    /// new beverage is appended locally and selected before the durable
    /// write runs; a write failure is logged and not rolled back.
    pub async fn make_beverage(&self) -> String {
        let beverage = {
            let mut state = self.shared.state.write().await;

            let Some(user) = state.user.clone() else {
                state.message = Some(MSG_NO_USER.to_string());
                self.shared.publish(&state);
                return MSG_NO_USER.to_string();
            };

            let (Some(temperature), Some(base), Some(creamer), Some(syrup)) = (
                state.current_temperature.clone(),
                state.current_base.clone(),
                state.current_creamer.clone(),
                state.current_syrup.clone(),
            ) else {
                state.message = Some(MSG_INCOMPLETE.to_string());
                self.shared.publish(&state);
                return MSG_INCOMPLETE.to_string();
            };

            let name = state.name_draft.trim().to_string();
            if name.is_empty() {
                state.message = Some(MSG_INCOMPLETE.to_string());
                self.shared.publish(&state);
                return MSG_INCOMPLETE.to_string();
            }

            let beverage = Beverage::new(user.uid, name, temperature, base, syrup, creamer);
            state.beverages.push(beverage.clone());
            state.current_beverage = Some(beverage.clone());
            self.shared.publish(&state);
            beverage
        };

        if let Err(e) = self.store.save_beverage(&beverage).await {
            tracing::warn!("beverage write failed for {}: {}", beverage.id, e);
        }

        let message = format!("Beverage {} made successfully!", beverage.name);
        {
            let mut state = self.shared.state.write().await;
            state.name_draft.clear();
            state.message = Some(message.clone());
            self.shared.publish(&state);
        }
        message
    }

    /// Selects a saved beverage and loads its composition back into the
    /// current selections and the name draft. Unknown ids are ignored.
    pub async fn show_beverage(&self, id: &str) {
        let mut state = self.shared.state.write().await;
        let Some(beverage) = state.beverages.iter().find(|b| b.id == id).cloned() else {
            return;
        };
        state.current_temperature = Some(beverage.temperature.clone());
        state.current_base = Some(beverage.base.clone());
        state.current_syrup = Some(beverage.syrup.clone());
        state.current_creamer = Some(beverage.creamer.clone());
        state.name_draft = beverage.name.clone();
        state.current_beverage = Some(beverage);
        self.shared.publish(&state);
    }

    /// Picks a base by catalog id. Unknown ids are ignored.
    pub async fn select_base(&self, id: &str) {
        let mut state = self.shared.state.write().await;
        if let Some(option) = state.bases.iter().find(|o| o.id == id).cloned() {
            state.current_base = Some(option);
            self.shared.publish(&state);
        }
    }

    /// Picks a syrup by catalog id. Unknown ids are ignored.
    pub async fn select_syrup(&self, id: &str) {
        let mut state = self.shared.state.write().await;
        if let Some(option) = state.syrups.iter().find(|o| o.id == id).cloned() {
            state.current_syrup = Some(option);
            self.shared.publish(&state);
        }
    }

    /// Picks a creamer by catalog id. Unknown ids are ignored.
    pub async fn select_creamer(&self, id: &str) {
        let mut state = self.shared.state.write().await;
        if let Some(option) = state.creamers.iter().find(|o| o.id == id).cloned() {
            state.current_creamer = Some(option);
            self.shared.publish(&state);
        }
    }

    /// Picks a serving temperature from the menu. Values outside the menu
    /// are ignored.
    pub async fn select_temperature(&self, temperature: &str) {
        let mut state = self.shared.state.write().await;
        if state.temperatures.iter().any(|t| t == temperature) {
            state.current_temperature = Some(temperature.to_string());
            self.shared.publish(&state);
        }
    }

    /// Updates the beverage-name draft.
    pub async fn set_name_draft(&self, name: impl Into<String>) {
        let mut state = self.shared.state.write().await;
        state.name_draft = name.into();
        self.shared.publish(&state);
    }
}

/// Forwards store snapshots into the session until the watch ends or the
/// session is gone.
fn spawn_forwarder(shared: Weak<Shared>, mut beverage_watch: BeverageWatch) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = beverage_watch.next().await {
            let Some(shared) = shared.upgrade() else {
                break;
            };
            apply_snapshot(&shared, snapshot).await;
        }
        tracing::debug!("beverage watch ended");
    })
}

/// Merges a store snapshot into local state by id: existing entries update
/// in place, new entries append in snapshot order, absent ids drop out.
/// Afterwards the current selection is refreshed from the merged list,
/// falling back to its first entry when the selected id disappeared.
async fn apply_snapshot(shared: &Shared, incoming: Vec<Beverage>) {
    let mut state = shared.state.write().await;

    let mut merged: Vec<Beverage> = Vec::with_capacity(incoming.len());
    for existing in &state.beverages {
        if let Some(update) = incoming.iter().find(|b| b.id == existing.id) {
            if !merged.iter().any(|b| b.id == update.id) {
                merged.push(update.clone());
            }
        }
    }
    for beverage in incoming {
        if !merged.iter().any(|b| b.id == beverage.id) {
            merged.push(beverage);
        }
    }

    let current_id = state.current_beverage.as_ref().map(|b| b.id.clone());
    state.current_beverage = match current_id.and_then(|id| merged.iter().find(|b| b.id == id)) {
        Some(found) => Some(found.clone()),
        None => merged.first().cloned(),
    };

    state.beverages = merged;
    tracing::debug!("applied beverage snapshot: {} entries", state.beverages.len());
    shared.publish(&state);
}

/// Drives a session from an identity feed.
///
/// Applies the feed's current value immediately, then forwards every change
/// to `set_user`. Failures are logged and the feed keeps running. The task
/// ends when the feed's sender is dropped.
pub fn follow_identity(
    session: BeverageSession,
    mut identity: watch::Receiver<Option<User>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let user = identity.borrow_and_update().clone();
            if let Err(e) = session.set_user(user).await {
                tracing::warn!("identity change rejected: {}", e);
            }
            if identity.changed().await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::time::timeout;

    use crate::store::MemoryStore;

    fn option(id: &str, name: &str) -> IngredientOption {
        IngredientOption::new(id, name, "#FFFFFF")
    }

    fn temperatures() -> Vec<String> {
        vec!["hot".to_string(), "warm".to_string(), "iced".to_string()]
    }

    fn beverage(id: &str, owner_id: &str, name: &str) -> Beverage {
        Beverage {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            temperature: "hot".to_string(),
            base: option("b1", "Espresso"),
            syrup: option("s1", "Vanilla"),
            creamer: option("c1", "Oat Milk"),
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .set_catalog(
                IngredientKind::Base,
                vec![option("b1", "Espresso"), option("b2", "Decaf")],
            )
            .await;
        store
            .set_catalog(
                IngredientKind::Syrup,
                vec![option("s1", "Vanilla"), option("s2", "Caramel")],
            )
            .await;
        store
            .set_catalog(
                IngredientKind::Creamer,
                vec![option("c1", "Oat Milk"), option("c2", "Half & Half")],
            )
            .await;
        store
    }

    async fn session_with_store() -> (BeverageSession, Arc<MemoryStore>) {
        let store = Arc::new(seeded_store().await);
        let session = BeverageSession::with_store(store.clone(), temperatures());
        (session, store)
    }

    /// Waits until the session state satisfies `pred`, or panics after a
    /// second without a matching change.
    async fn wait_for<F>(session: &BeverageSession, pred: F) -> SessionState
    where
        F: Fn(&SessionState) -> bool,
    {
        let mut rx = session.watch();
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            timeout(Duration::from_secs(1), rx.changed())
                .await
                .expect("timed out waiting for session change")
                .expect("session dropped");
        }
    }

    struct FailingCatalogs;

    #[async_trait::async_trait]
    impl CatalogReader for FailingCatalogs {
        async fn fetch_catalog(
            &self,
            _kind: IngredientKind,
        ) -> Result<Vec<IngredientOption>, StoreError> {
            Err(StoreError::HttpError("catalog fetch refused".to_string()))
        }
    }

    struct FailingWrites;

    #[async_trait::async_trait]
    impl BeverageStore for FailingWrites {
        async fn save_beverage(&self, _beverage: &Beverage) -> Result<(), StoreError> {
            Err(StoreError::HttpError("Server returned status 503".to_string()))
        }

        async fn watch_beverages(&self, _owner_id: &str) -> Result<BeverageWatch, StoreError> {
            // Silent watch, the sender is gone before the first snapshot
            let (_tx, watch) = BeverageWatch::channel();
            Ok(watch)
        }
    }

    struct FailingWatches;

    #[async_trait::async_trait]
    impl BeverageStore for FailingWatches {
        async fn save_beverage(&self, _beverage: &Beverage) -> Result<(), StoreError> {
            Ok(())
        }

        async fn watch_beverages(&self, _owner_id: &str) -> Result<BeverageWatch, StoreError> {
            Err(StoreError::ConnectionError("connection refused".to_string()))
        }
    }

    // ==================== Init Tests ====================

    #[tokio::test]
    async fn test_init_defaults_to_first_entries() {
        let (session, _store) = session_with_store().await;
        session.init().await.unwrap();

        let state = session.snapshot().await;
        assert_eq!(state.bases.len(), 2);
        assert_eq!(state.syrups.len(), 2);
        assert_eq!(state.creamers.len(), 2);
        assert_eq!(state.current_base.as_ref().map(|o| o.id.as_str()), Some("b1"));
        assert_eq!(state.current_syrup.as_ref().map(|o| o.id.as_str()), Some("s1"));
        assert_eq!(
            state.current_creamer.as_ref().map(|o| o.id.as_str()),
            Some("c1")
        );
        assert_eq!(state.current_temperature.as_deref(), Some("hot"));
    }

    #[tokio::test]
    async fn test_init_with_empty_catalogs() {
        let store = Arc::new(MemoryStore::new());
        let session = BeverageSession::with_store(store, Vec::new());
        session.init().await.unwrap();

        let state = session.snapshot().await;
        assert!(state.current_base.is_none());
        assert!(state.current_syrup.is_none());
        assert!(state.current_creamer.is_none());
        assert!(state.current_temperature.is_none());
    }

    #[tokio::test]
    async fn test_init_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let session =
            BeverageSession::new(Arc::new(FailingCatalogs), store, temperatures());

        let err = session.init().await.unwrap_err();
        assert!(matches!(err, SessionError::Catalog { .. }));
        // State stays untouched
        let state = session.snapshot().await;
        assert!(state.bases.is_empty());
        assert!(state.current_temperature.is_none());
    }

    // ==================== User Tests ====================

    #[tokio::test]
    async fn test_set_user_scopes_beverages_to_new_owner() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();

        session.set_user(Some(User::new("u1"))).await.unwrap();
        session.set_name_draft("First").await;
        session.make_beverage().await;
        wait_for(&session, |s| s.beverages.len() == 1).await;

        session.set_user(Some(User::new("u2"))).await.unwrap();
        let state = wait_for(&session, |s| {
            s.user.as_ref().map(|u| u.uid.as_str()) == Some("u2")
        })
        .await;
        assert!(state.beverages.is_empty());
        assert!(state.current_beverage.is_none());
        assert!(state.message.is_none());

        // A save by the old owner must not reach the session anymore
        store
            .save_beverage(&beverage("u1-900", "u1", "Orphan"))
            .await
            .unwrap();

        session.set_name_draft("Second").await;
        session.make_beverage().await;
        let state = wait_for(&session, |s| !s.beverages.is_empty()).await;
        assert!(state.beverages.iter().all(|b| b.owner_id == "u2"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        session.set_name_draft("Mocha").await;
        session.make_beverage().await;

        session.set_user(None).await.unwrap();
        let state = session.snapshot().await;
        assert!(state.user.is_none());
        assert!(state.beverages.is_empty());
        assert!(state.current_beverage.is_none());
        assert!(state.message.is_none());
        // Catalogs survive sign-out
        assert_eq!(state.bases.len(), 2);
        assert_eq!(state.current_base.as_ref().map(|o| o.id.as_str()), Some("b1"));

        // The subscription is detached too, saves by the signed-out owner
        // no longer reach the session
        store
            .save_beverage(&beverage("u1-900", "u1", "Orphan"))
            .await
            .unwrap();
        let state = session.snapshot().await;
        assert!(state.beverages.is_empty());
        assert!(state.current_beverage.is_none());
    }

    #[tokio::test]
    async fn test_failed_watch_reverts_to_signed_out() {
        let catalogs = Arc::new(seeded_store().await);
        let session = BeverageSession::new(catalogs, Arc::new(FailingWatches), temperatures());
        session.init().await.unwrap();

        let err = session.set_user(Some(User::new("u1"))).await.unwrap_err();
        assert!(matches!(err, SessionError::Subscribe { .. }));

        let state = session.snapshot().await;
        assert!(state.user.is_none());
        assert!(state.beverages.is_empty());
        assert!(state.current_beverage.is_none());

        // The session behaves signed out afterwards
        session.set_name_draft("Latte").await;
        let message = session.make_beverage().await;
        assert_eq!(message, "No user logged in, please sign in first.");
    }

    #[tokio::test]
    async fn test_login_receives_existing_beverages() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        store
            .save_beverage(&beverage("u1-100", "u1", "Stored"))
            .await
            .unwrap();

        session.set_user(Some(User::new("u1"))).await.unwrap();
        let state = wait_for(&session, |s| !s.beverages.is_empty()).await;
        assert_eq!(state.beverages[0].name, "Stored");
        // First beverage becomes the selection
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some("u1-100")
        );
    }

    // ==================== Make Beverage Tests ====================

    #[tokio::test]
    async fn test_make_beverage_requires_user() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        session.set_name_draft("Morning Fuel").await;

        let message = session.make_beverage().await;
        assert_eq!(message, "No user logged in, please sign in first.");

        let state = session.snapshot().await;
        assert_eq!(
            state.message.as_deref(),
            Some("No user logged in, please sign in first.")
        );
        assert!(state.beverages.is_empty());
        assert!(store.beverages_for("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_make_beverage_requires_complete_selections() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();

        // Name draft still empty
        let message = session.make_beverage().await;
        assert_eq!(
            message,
            "Please complete all beverage options and the name before making a beverage."
        );

        // Whitespace does not count as a name
        session.set_name_draft("   ").await;
        let message = session.make_beverage().await;
        assert_eq!(
            message,
            "Please complete all beverage options and the name before making a beverage."
        );
        assert!(store.beverages_for("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_make_beverage_requires_selections_after_empty_init() {
        let store = Arc::new(MemoryStore::new());
        let session = BeverageSession::with_store(store, temperatures());
        session.init().await.unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        session.set_name_draft("Americano").await;

        // Catalogs were empty, so no base/syrup/creamer is selected
        let message = session.make_beverage().await;
        assert_eq!(
            message,
            "Please complete all beverage options and the name before making a beverage."
        );
    }

    #[tokio::test]
    async fn test_make_beverage_success() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        session.set_user(Some(User::new("u42"))).await.unwrap();
        session.set_name_draft("  Mocha  ").await;

        let message = session.make_beverage().await;
        assert_eq!(message, "Beverage Mocha made successfully!");

        let state = session.snapshot().await;
        assert_eq!(state.beverages.len(), 1);
        let made = &state.beverages[0];
        assert!(made.id.starts_with("u42-"));
        assert_eq!(made.owner_id, "u42");
        assert_eq!(made.name, "Mocha");
        assert_eq!(made.temperature, "hot");
        assert_eq!(made.base.id, "b1");
        assert_eq!(made.syrup.id, "s1");
        assert_eq!(made.creamer.id, "c1");
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some(made.id.as_str())
        );
        assert!(state.name_draft.is_empty());
        assert_eq!(state.message.as_deref(), Some("Beverage Mocha made successfully!"));

        let stored = store.beverages_for("u42").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, made.id);
    }

    #[tokio::test]
    async fn test_make_beverage_write_failure_keeps_entry() {
        let catalogs = Arc::new(seeded_store().await);
        let session = BeverageSession::new(catalogs, Arc::new(FailingWrites), temperatures());
        session.init().await.unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        session.set_name_draft("Latte").await;

        // The write fails, the optimistic entry is not rolled back
        let message = session.make_beverage().await;
        assert_eq!(message, "Beverage Latte made successfully!");

        let state = session.snapshot().await;
        assert_eq!(state.beverages.len(), 1);
        assert_eq!(state.beverages[0].name, "Latte");
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some(state.beverages[0].id.as_str())
        );
        assert!(state.name_draft.is_empty());
        assert_eq!(state.message.as_deref(), Some("Beverage Latte made successfully!"));
    }

    // ==================== Show Beverage Tests ====================

    #[tokio::test]
    async fn test_show_beverage_loads_composition() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        store
            .save_beverage(&beverage("u1-100", "u1", "Refill"))
            .await
            .unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        wait_for(&session, |s| !s.beverages.is_empty()).await;

        // Drift the selections away from the stored composition
        session.select_base("b2").await;
        session.select_temperature("iced").await;
        session.set_name_draft("Scratch").await;

        session.show_beverage("u1-100").await;
        let state = session.snapshot().await;
        assert_eq!(state.current_base.as_ref().map(|o| o.id.as_str()), Some("b1"));
        assert_eq!(state.current_temperature.as_deref(), Some("hot"));
        assert_eq!(state.name_draft, "Refill");
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some("u1-100")
        );
    }

    #[tokio::test]
    async fn test_show_beverage_unknown_id_is_noop() {
        let (session, _store) = session_with_store().await;
        session.init().await.unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        session.set_name_draft("Keep me").await;

        let before = session.snapshot().await;
        session.show_beverage("u1-does-not-exist").await;
        let after = session.snapshot().await;
        assert_eq!(before, after);
    }

    // ==================== Subscription Tests ====================

    #[tokio::test]
    async fn test_removal_falls_back_to_first_beverage() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        store
            .save_beverage(&beverage("u1-100", "u1", "A"))
            .await
            .unwrap();
        store
            .save_beverage(&beverage("u1-200", "u1", "B"))
            .await
            .unwrap();

        session.set_user(Some(User::new("u1"))).await.unwrap();
        wait_for(&session, |s| s.beverages.len() == 2).await;

        session.show_beverage("u1-200").await;

        store.remove_beverage("u1-200").await;
        let state = wait_for(&session, |s| s.beverages.len() == 1).await;
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some("u1-100")
        );

        store.remove_beverage("u1-100").await;
        let state = wait_for(&session, |s| s.beverages.is_empty()).await;
        assert!(state.current_beverage.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_updates_entry_in_place() {
        let (session, store) = session_with_store().await;
        session.init().await.unwrap();
        store
            .save_beverage(&beverage("u1-100", "u1", "A"))
            .await
            .unwrap();
        store
            .save_beverage(&beverage("u1-200", "u1", "B"))
            .await
            .unwrap();
        session.set_user(Some(User::new("u1"))).await.unwrap();
        wait_for(&session, |s| s.beverages.len() == 2).await;
        session.show_beverage("u1-100").await;

        store
            .save_beverage(&beverage("u1-100", "u1", "A Deluxe"))
            .await
            .unwrap();

        let state = wait_for(&session, |s| {
            s.beverages.iter().any(|b| b.name == "A Deluxe")
        })
        .await;
        assert_eq!(state.beverages.len(), 2);
        // Local ordering holds and the selection tracks the update
        assert_eq!(state.beverages[0].id, "u1-100");
        assert_eq!(state.beverages[1].id, "u1-200");
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.name.as_str()),
            Some("A Deluxe")
        );
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_snapshot_collapse() {
        let (session, _store) = session_with_store().await;
        let entry = beverage("u1-100", "u1", "A");

        apply_snapshot(&session.shared, vec![entry.clone(), entry.clone()]).await;

        let state = session.snapshot().await;
        assert_eq!(state.beverages.len(), 1);
        assert_eq!(
            state.current_beverage.as_ref().map(|b| b.id.as_str()),
            Some("u1-100")
        );
    }

    // ==================== Selection Tests ====================

    #[tokio::test]
    async fn test_select_ingredients_and_temperature() {
        let (session, _store) = session_with_store().await;
        session.init().await.unwrap();

        session.select_base("b2").await;
        session.select_syrup("s2").await;
        session.select_creamer("c2").await;
        session.select_temperature("iced").await;

        let state = session.snapshot().await;
        assert_eq!(state.current_base.as_ref().map(|o| o.id.as_str()), Some("b2"));
        assert_eq!(state.current_syrup.as_ref().map(|o| o.id.as_str()), Some("s2"));
        assert_eq!(
            state.current_creamer.as_ref().map(|o| o.id.as_str()),
            Some("c2")
        );
        assert_eq!(state.current_temperature.as_deref(), Some("iced"));
    }

    #[tokio::test]
    async fn test_select_unknown_values_are_ignored() {
        let (session, _store) = session_with_store().await;
        session.init().await.unwrap();

        session.select_base("zzz").await;
        session.select_temperature("frozen").await;

        let state = session.snapshot().await;
        assert_eq!(state.current_base.as_ref().map(|o| o.id.as_str()), Some("b1"));
        assert_eq!(state.current_temperature.as_deref(), Some("hot"));
    }

    // ==================== Watch & Identity Tests ====================

    #[tokio::test]
    async fn test_watch_notifies_on_change() {
        let (session, _store) = session_with_store().await;
        let mut rx = session.watch();

        session.set_name_draft("Cortado").await;

        timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("timed out")
            .expect("sender dropped");
        assert_eq!(rx.borrow().name_draft, "Cortado");
    }

    #[tokio::test]
    async fn test_follow_identity_drives_session() {
        let (session, _store) = session_with_store().await;
        session.init().await.unwrap();

        let (tx, rx) = watch::channel(None::<User>);
        let handle = follow_identity(session.clone(), rx);

        tx.send(Some(User::new("u9"))).unwrap();
        let state = wait_for(&session, |s| s.user.is_some()).await;
        assert_eq!(state.user.map(|u| u.uid), Some("u9".to_string()));

        tx.send(None).unwrap();
        wait_for(&session, |s| s.user.is_none()).await;

        drop(tx);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("identity task did not end")
            .expect("identity task panicked");
    }
}
