//! Service layer
//!
//! Business logic on top of the store contract:
//! - Account registration and identity lookup
//! - Encrypted direct messaging

mod account;
mod messaging;

pub use account::AccountService;
pub use messaging::MessageService;
