//! Wire format for beverage documents.
//!
//! A saved beverage lives in the `beverages` collection as a document whose
//! id is the collection key, not part of the body. Body fields map to
//! `Beverage` by name, with `uid` carrying the owner.

use serde::{Deserialize, Serialize};

use crate::models::{Beverage, IngredientOption};

/// Collection holding saved beverage documents.
pub const BEVERAGES_COLLECTION: &str = "beverages";

/// Stored fields of a beverage document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeverageDocument {
    pub uid: String,
    pub name: String,
    pub temperature: String,
    pub base: IngredientOption,
    pub syrup: IngredientOption,
    pub creamer: IngredientOption,
}

/// A beverage document paired with its id, the shape watch snapshots carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredBeverage {
    pub id: String,
    #[serde(flatten)]
    pub document: BeverageDocument,
}

impl BeverageDocument {
    /// Extracts the stored fields of a beverage.
    pub fn from_beverage(beverage: &Beverage) -> Self {
        Self {
            uid: beverage.owner_id.clone(),
            name: beverage.name.clone(),
            temperature: beverage.temperature.clone(),
            base: beverage.base.clone(),
            syrup: beverage.syrup.clone(),
            creamer: beverage.creamer.clone(),
        }
    }

    /// Rehydrates a beverage from a document and its id.
    pub fn into_beverage(self, id: impl Into<String>) -> Beverage {
        Beverage {
            id: id.into(),
            owner_id: self.uid,
            name: self.name,
            temperature: self.temperature,
            base: self.base,
            syrup: self.syrup,
            creamer: self.creamer,
        }
    }
}

impl StoredBeverage {
    pub fn from_beverage(beverage: &Beverage) -> Self {
        Self {
            id: beverage.id.clone(),
            document: BeverageDocument::from_beverage(beverage),
        }
    }

    pub fn into_beverage(self) -> Beverage {
        self.document.into_beverage(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beverage() -> Beverage {
        Beverage::new(
            "u42",
            "Mocha",
            "hot",
            IngredientOption::new("b1", "Espresso", "#3B2F2F"),
            IngredientOption::new("s1", "Chocolate", "#5C4033"),
            IngredientOption::new("c1", "Oat Milk", "#F5E6C8"),
        )
    }

    #[test]
    fn test_document_drops_id() {
        let beverage = beverage();
        let document = BeverageDocument::from_beverage(&beverage);
        assert_eq!(document.uid, "u42");
        assert_eq!(document.name, "Mocha");

        let json = serde_json::to_value(&document).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["uid"], "u42");
    }

    #[test]
    fn test_stored_beverage_roundtrip() {
        let beverage = beverage();
        let stored = StoredBeverage::from_beverage(&beverage);
        assert_eq!(stored.id, beverage.id);
        assert_eq!(stored.into_beverage(), beverage);
    }

    #[test]
    fn test_stored_beverage_flattens_on_wire() {
        let stored = StoredBeverage::from_beverage(&beverage());
        let json = serde_json::to_value(&stored).unwrap();
        // id and document fields sit at the same level
        assert_eq!(json["id"], stored.id.as_str());
        assert_eq!(json["uid"], "u42");
        assert_eq!(json["temperature"], "hot");
        assert_eq!(json["base"]["id"], "b1");
    }

    #[test]
    fn test_into_beverage_maps_uid_to_owner() {
        let document = BeverageDocument::from_beverage(&beverage());
        let rebuilt = document.into_beverage("u42-1234");
        assert_eq!(rebuilt.id, "u42-1234");
        assert_eq!(rebuilt.owner_id, "u42");
    }
}
