//! Account service
//!
//! Identity registration and lookup. A key pair is generated once at
//! registration and is immutable thereafter; key rotation is out of
//! scope.

use std::sync::Arc;

use chrono::Utc;

use crate::crypto;
use crate::data::{DataStore, EntityId, FederatedIdentity};
use crate::error::AppError;

/// Identity registration and lookup operations
pub struct AccountService<S> {
    store: Arc<S>,
}

impl<S: DataStore> AccountService<S> {
    /// Create a new account service
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn validate_part(value: &str, what: &str) -> Result<(), AppError> {
        if value.is_empty() || value.contains('@') || value.contains(char::is_whitespace) {
            return Err(AppError::Validation(format!(
                "Invalid {}: {:?}",
                what, value
            )));
        }
        Ok(())
    }

    /// Register a local identity
    ///
    /// Generates an RSA-4096 key pair and persists the identity with
    /// its private key material. Fails when the address is taken.
    pub async fn register(
        &self,
        username: &str,
        domain: &str,
    ) -> Result<FederatedIdentity, AppError> {
        Self::validate_part(username, "username")?;
        Self::validate_part(domain, "domain")?;

        let address = format!("{}@{}", username, domain);
        if self.store.get_identity(&address).await?.is_some() {
            return Err(AppError::Validation(format!(
                "Address already registered: {}",
                address
            )));
        }

        let pair = crypto::generate_key_pair()?;

        let identity = FederatedIdentity {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: domain.to_string(),
            public_key_pem: pair.public_key_pem,
            private_key_pem: Some(pair.private_key_pem),
            created_at: Utc::now(),
        };
        self.store.create_identity(&identity).await?;

        tracing::info!(address = %identity.address(), "Registered local identity");
        Ok(identity)
    }

    /// Cache a remote identity as a read-only projection
    ///
    /// Only the public key is stored; the remote server keeps the
    /// private key material.
    pub async fn register_remote(
        &self,
        username: &str,
        domain: &str,
        public_key_pem: &str,
    ) -> Result<FederatedIdentity, AppError> {
        Self::validate_part(username, "username")?;
        Self::validate_part(domain, "domain")?;

        let address = format!("{}@{}", username, domain);
        if let Some(existing) = self.store.get_identity(&address).await? {
            return Ok(existing);
        }

        let identity = FederatedIdentity {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: domain.to_string(),
            public_key_pem: public_key_pem.to_string(),
            private_key_pem: None,
            created_at: Utc::now(),
        };
        self.store.create_identity(&identity).await?;

        tracing::debug!(address = %identity.address(), "Cached remote identity");
        Ok(identity)
    }

    /// Look up an identity by federated address
    pub async fn lookup(&self, address: &str) -> Result<Option<FederatedIdentity>, AppError> {
        self.store.get_identity(address).await
    }
}
