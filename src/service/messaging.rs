//! Messaging service
//!
//! Direct messages between federated identities. Plaintext is
//! hybrid-encrypted with the recipient's public key before it is
//! stored; the server never persists plaintext.

use std::sync::Arc;

use crate::crypto;
use crate::data::{DataStore, EncryptedMessage};
use crate::error::AppError;

/// Encrypted direct-message operations
pub struct MessageService<S> {
    store: Arc<S>,
}

impl<S: DataStore> MessageService<S> {
    /// Create a new message service
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Encrypt and store a message
    ///
    /// Rejected with `NotPermitted` when either party blocks the other,
    /// and with `NotFound` when the recipient's key is unknown.
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        plaintext: &str,
    ) -> Result<EncryptedMessage, AppError> {
        if self.store.is_blocked(from, to).await? || self.store.is_blocked(to, from).await? {
            return Err(AppError::NotPermitted);
        }

        let Some(recipient_key) = self.store.get_public_key(to).await? else {
            return Err(AppError::NotFound);
        };

        let payload = crypto::encrypt_message(plaintext, &recipient_key)?;
        let message = EncryptedMessage::new(from, to, payload);
        self.store.create_message(&message).await?;

        tracing::debug!(message_id = %message.id, "Stored encrypted message");
        Ok(message)
    }

    /// Fetch a message; only the sender or recipient may read it back
    pub async fn get(
        &self,
        message_id: &str,
        requester: &str,
    ) -> Result<Option<EncryptedMessage>, AppError> {
        self.store.get_message(message_id, requester).await
    }

    /// Decrypt a stored message with the reader's private key
    pub fn decrypt(
        &self,
        message: &EncryptedMessage,
        private_key_pem: &str,
    ) -> Result<String, AppError> {
        crypto::decrypt_message(&message.payload(), private_key_pem)
    }

    /// Mark a message read; only the recipient may do so
    pub async fn mark_read(&self, message_id: &str, reader: &str) -> Result<bool, AppError> {
        self.store.mark_message_read(message_id, reader).await
    }

    /// Count of unread messages for an address
    pub async fn unread_count(&self, address: &str) -> Result<i64, AppError> {
        self.store.unread_count(address).await
    }

    /// Page through the conversation between two addresses
    pub async fn conversation(
        &self,
        a: &str,
        b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EncryptedMessage>, AppError> {
        self.store.conversation(a, b, limit, offset).await
    }
}
