//! Data layer module
//!
//! Handles persistence behind the store contract:
//! - The `DataStore` trait the federation engine consumes
//! - SQLite implementation of the contract

mod models;
mod sqlite;
mod store;

pub use models::{ContentItem, EncryptedMessage, EntityId, FederatedIdentity, split_address};
pub use sqlite::SqliteStore;
pub use store::{DataStore, InteractionCounter};
