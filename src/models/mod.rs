mod beverage;
mod ingredient;
mod user;

pub use beverage::Beverage;
pub use ingredient::{IngredientKind, IngredientOption};
pub use user::User;
