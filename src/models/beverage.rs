use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ingredient::IngredientOption;

/// A saved beverage composition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Beverage {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub temperature: String,
    pub base: IngredientOption,
    pub syrup: IngredientOption,
    pub creamer: IngredientOption,
}

impl Beverage {
    /// Creates a beverage owned by `owner_id`, deriving the id from the
    /// current wall clock as `{owner_id}-{epoch_millis}`.
    ///
    /// Two beverages created by the same owner within one millisecond share
    /// an id; the store's upsert semantics make the last write win.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        temperature: impl Into<String>,
        base: IngredientOption,
        syrup: IngredientOption,
        creamer: IngredientOption,
    ) -> Self {
        let owner_id = owner_id.into();
        let id = format!("{}-{}", owner_id, Utc::now().timestamp_millis());
        Self {
            id,
            owner_id,
            name: name.into(),
            temperature: temperature.into(),
            base,
            syrup,
            creamer,
        }
    }
}

impl fmt::Display for Beverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} + {} + {}",
            self.name, self.temperature, self.base.name, self.syrup.name, self.creamer.name
        )
    }
}
