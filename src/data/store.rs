//! Data store contract
//!
//! The federation engine issues abstract read/write operations against
//! a store; this trait is that contract. Operations are atomic at the
//! single-row level and no cross-entity transaction is required.

use crate::error::AppError;

use super::models::{ContentItem, EncryptedMessage, FederatedIdentity};

/// Interaction counters kept on content rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionCounter {
    Like,
    Comment,
    Repost,
    Quote,
}

impl InteractionCounter {
    /// Column backing this counter
    pub fn column(&self) -> &'static str {
        match self {
            Self::Like => "like_count",
            Self::Comment => "comment_count",
            Self::Repost => "repost_count",
            Self::Quote => "quote_count",
        }
    }
}

/// Store contract consumed by the federation engine
///
/// Predicates (`is_domain_blocked`, `is_blocked`, `can_interact`) are
/// the policy hooks the dispatcher consults; the write operations are
/// the per-entity CRUD surface it mutates through.
#[allow(async_fn_in_trait)]
pub trait DataStore: Send + Sync {
    // --- Identities -------------------------------------------------------

    async fn create_identity(&self, identity: &FederatedIdentity) -> Result<(), AppError>;
    async fn get_identity(&self, address: &str) -> Result<Option<FederatedIdentity>, AppError>;
    /// Public key for a federated address, if the identity is known
    async fn get_public_key(&self, address: &str) -> Result<Option<String>, AppError>;

    // --- Policy predicates ------------------------------------------------

    /// True when the whole domain is on the local block list
    async fn is_domain_blocked(&self, domain: &str) -> Result<bool, AppError>;
    /// True when `actor` has a directed block edge against `target`
    async fn is_blocked(&self, actor: &str, target: &str) -> Result<bool, AppError>;
    /// Interaction policy: may `actor` act on `content_id`?
    ///
    /// False when the content is unknown or either side blocks the other.
    async fn can_interact(&self, actor: &str, content_id: &str) -> Result<bool, AppError>;
    async fn block_domain(&self, domain: &str) -> Result<(), AppError>;

    // --- Social graph -----------------------------------------------------

    /// Add a follower edge; returns false when the edge already existed
    async fn add_follower(&self, target: &str, follower: &str) -> Result<bool, AppError>;
    async fn remove_follower(&self, target: &str, follower: &str) -> Result<bool, AppError>;
    async fn followers_of(&self, target: &str) -> Result<Vec<String>, AppError>;
    /// Add a directed block edge; returns false when already present
    async fn add_block(&self, actor: &str, target: &str) -> Result<bool, AppError>;
    /// Drop follow edges in both directions between two addresses
    async fn remove_follows_between(&self, a: &str, b: &str) -> Result<(), AppError>;

    // --- Content and interactions -----------------------------------------

    async fn create_content(&self, content: &ContentItem) -> Result<(), AppError>;
    async fn get_content(&self, content_id: &str) -> Result<Option<ContentItem>, AppError>;
    async fn adjust_counter(
        &self,
        content_id: &str,
        counter: InteractionCounter,
        delta: i64,
    ) -> Result<(), AppError>;

    async fn find_like(&self, actor: &str, content_id: &str) -> Result<Option<String>, AppError>;
    async fn create_like(
        &self,
        actor: &str,
        content_id: &str,
        reaction: &str,
    ) -> Result<String, AppError>;
    async fn remove_like(&self, actor: &str, content_id: &str) -> Result<bool, AppError>;

    async fn create_comment(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<String, AppError>;

    async fn find_repost(&self, actor: &str, content_id: &str) -> Result<Option<String>, AppError>;
    async fn create_repost(
        &self,
        actor: &str,
        content_id: &str,
        note: Option<&str>,
    ) -> Result<String, AppError>;

    async fn create_quote(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
    ) -> Result<String, AppError>;

    async fn create_thread(
        &self,
        actor: &str,
        title: &str,
        descriptor: &serde_json::Value,
    ) -> Result<String, AppError>;

    // --- Messages ---------------------------------------------------------

    async fn create_message(&self, message: &EncryptedMessage) -> Result<(), AppError>;
    /// Fetch a message; only the sender or recipient may read it back
    async fn get_message(
        &self,
        message_id: &str,
        requester: &str,
    ) -> Result<Option<EncryptedMessage>, AppError>;
    /// Mark a message read; only the recipient may do so
    async fn mark_message_read(&self, message_id: &str, reader: &str) -> Result<bool, AppError>;
    async fn unread_count(&self, address: &str) -> Result<i64, AppError>;
    async fn conversation(
        &self,
        a: &str,
        b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EncryptedMessage>, AppError>;
}
