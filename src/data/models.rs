//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedPayload;

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Split a federated address (`user@domain`) into its parts
///
/// Returns `None` when either part is empty or the separator is missing.
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let (username, domain) = address.split_once('@')?;
    if username.is_empty() || domain.is_empty() {
        return None;
    }
    Some((username, domain))
}

// =============================================================================
// Identity
// =============================================================================

/// A federated identity, local or remote
///
/// Local identities carry their private key; remote identities are
/// cached read-only projections (public key only). The key pair is
/// generated once at registration and never rotated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FederatedIdentity {
    pub id: String,
    pub username: String,
    pub domain: String,
    /// SPKI PEM public key
    pub public_key_pem: String,
    /// PKCS#8 PEM private key (local identities only)
    pub private_key_pem: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FederatedIdentity {
    /// The identity's federated address (`user@domain`)
    pub fn address(&self) -> String {
        format!("{}@{}", self.username, self.domain)
    }

    /// True when the private key material is held locally
    pub fn is_local(&self) -> bool {
        self.private_key_pem.is_some()
    }
}

// =============================================================================
// Content
// =============================================================================

/// A piece of federated content with interaction counters
///
/// Content authoring itself is outside the engine; rows exist so the
/// dispatcher can resolve authors and adjust counters.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentItem {
    pub id: String,
    pub author_address: String,
    pub body: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub repost_count: i64,
    pub quote_count: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Messages
// =============================================================================

/// An encrypted direct message
///
/// Immutable after creation except the `read` flag, which only the
/// recipient may set. The server never holds the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EncryptedMessage {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub cipher_text: String,
    pub wrapped_key: String,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl EncryptedMessage {
    /// Build a new message record from an encrypted payload
    pub fn new(from_address: &str, to_address: &str, payload: EncryptedPayload) -> Self {
        Self {
            id: EntityId::new().0,
            from_address: from_address.to_string(),
            to_address: to_address.to_string(),
            cipher_text: payload.cipher_text,
            wrapped_key: payload.wrapped_key,
            algorithm: payload.algorithm,
            created_at: Utc::now(),
            read: false,
        }
    }

    /// Reconstruct the crypto payload for decryption
    pub fn payload(&self) -> EncryptedPayload {
        EncryptedPayload {
            cipher_text: self.cipher_text.clone(),
            wrapped_key: self.wrapped_key.clone(),
            algorithm: self.algorithm.clone(),
        }
    }
}
