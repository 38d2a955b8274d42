use serde::{Deserialize, Serialize};
use std::fmt;

/// The three customizable ingredient slots of a beverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IngredientKind {
    Base,
    Syrup,
    Creamer,
}

impl IngredientKind {
    /// All kinds, in catalog-loading order.
    pub const ALL: [IngredientKind; 3] = [
        IngredientKind::Base,
        IngredientKind::Syrup,
        IngredientKind::Creamer,
    ];

    /// Remote collection name holding this kind's catalog.
    pub fn collection(&self) -> &'static str {
        match self {
            IngredientKind::Base => "bases",
            IngredientKind::Syrup => "syrups",
            IngredientKind::Creamer => "creamers",
        }
    }

    /// Parses a collection name back into a kind.
    pub fn parse(name: &str) -> Option<IngredientKind> {
        match name {
            "bases" => Some(IngredientKind::Base),
            "syrups" => Some(IngredientKind::Syrup),
            "creamers" => Some(IngredientKind::Creamer),
            _ => None,
        }
    }
}

impl fmt::Display for IngredientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngredientKind::Base => write!(f, "base"),
            IngredientKind::Syrup => write!(f, "syrup"),
            IngredientKind::Creamer => write!(f, "creamer"),
        }
    }
}

/// One selectable entry in an ingredient catalog.
///
/// `color` is a display hint carried verbatim from the catalog document;
/// the session does not interpret it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientOption {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl IngredientOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}
