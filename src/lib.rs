//! Brewmix Core Library
//!
//! Client-side session state for the Brewmix beverage builder: ingredient
//! catalogs read from a document store, owner-scoped saved beverages with
//! live updates, and the session state machine that ties both to an
//! authenticated user.

pub mod config;
pub mod models;
pub mod remote;
pub mod session;
pub mod store;

pub use config::{Config, ConfigError, RemoteConfig};
pub use models::{Beverage, IngredientKind, IngredientOption, User};
pub use remote::{check_server, RemoteStore};
pub use session::{
    follow_identity, BeverageSession, SessionError, SessionState, MSG_INCOMPLETE, MSG_NO_USER,
};
pub use store::{
    BeverageDocument, BeverageStore, BeverageWatch, CatalogReader, MemoryStore, StoreError,
    StoredBeverage,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
