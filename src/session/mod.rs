//! Per-session language configuration.

pub mod store;

pub use store::{SessionLanguageState, SessionStore};
