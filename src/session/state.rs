//! Session state snapshot.

use serde::{Deserialize, Serialize};

use crate::models::{Beverage, IngredientOption, User};

/// Status line shown when an operation needs a signed-in user.
pub const MSG_NO_USER: &str = "No user logged in, please sign in first.";
/// Status line shown when selections or the name are incomplete.
pub const MSG_INCOMPLETE: &str =
    "Please complete all beverage options and the name before making a beverage.";

/// Immutable snapshot of a beverage session, cloned out to consumers on
/// every change.
///
/// Catalog lists are filled once by `init` and read-only afterwards.
/// `beverages` always belongs to the current `user`; the active subscription
/// handle is session-internal and not part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub user: Option<User>,
    pub bases: Vec<IngredientOption>,
    pub syrups: Vec<IngredientOption>,
    pub creamers: Vec<IngredientOption>,
    /// Serving temperature menu, fixed at construction. First entry is the
    /// default selection.
    pub temperatures: Vec<String>,
    pub current_base: Option<IngredientOption>,
    pub current_syrup: Option<IngredientOption>,
    pub current_creamer: Option<IngredientOption>,
    pub current_temperature: Option<String>,
    pub name_draft: String,
    pub beverages: Vec<Beverage>,
    pub current_beverage: Option<Beverage>,
    pub message: Option<String>,
}

impl SessionState {
    /// Empty logged-out state with the given temperature menu.
    pub fn new(temperatures: Vec<String>) -> Self {
        Self {
            temperatures,
            ..Self::default()
        }
    }
}
