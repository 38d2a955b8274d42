//! Beverage session state machine and identity plumbing.
//!
//! `BeverageSession` ties the store seams to an authenticated user: two
//! states, logged out (no user, no beverages, no subscription) and logged in
//! (one live watch scoped to the user's beverages). `follow_identity` feeds
//! the session from an external identity provider.

#[allow(clippy::module_inception)]
mod session;
mod state;

pub use session::{follow_identity, BeverageSession, SessionError};
pub use state::{SessionState, MSG_INCOMPLETE, MSG_NO_USER};
