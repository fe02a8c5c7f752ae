//! Activity dispatch
//!
//! Per-type handlers mutating local state through the data store.
//! Business-rule rejections (already liked, not allowed) come back as
//! structured outcomes; only malformed input and storage failures
//! surface as errors.

use std::sync::Arc;

use serde::Serialize;

use crate::data::{DataStore, EncryptedMessage, InteractionCounter};
use crate::error::AppError;

use super::activity::{Activity, MessagePayload};

/// Structured handler status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Followed,
    Blocked,
    Liked,
    AlreadyLiked,
    Unliked,
    NotFound,
    Commented,
    Quoted,
    Reposted,
    AlreadyReposted,
    ThreadCreated,
    Delivered,
    NotAllowed,
}

impl DispatchStatus {
    /// Wire token for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Followed => "followed",
            Self::Blocked => "blocked",
            Self::Liked => "liked",
            Self::AlreadyLiked => "already_liked",
            Self::Unliked => "unliked",
            Self::NotFound => "not_found",
            Self::Commented => "commented",
            Self::Quoted => "quoted",
            Self::Reposted => "reposted",
            Self::AlreadyReposted => "already_reposted",
            Self::ThreadCreated => "thread_created",
            Self::Delivered => "delivered",
            Self::NotAllowed => "not_allowed",
        }
    }
}

/// Outcome of dispatching one activity
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
}

impl DispatchOutcome {
    fn status(status: DispatchStatus) -> Self {
        Self {
            status,
            created_id: None,
        }
    }

    fn created(status: DispatchStatus, id: String) -> Self {
        Self {
            status,
            created_id: Some(id),
        }
    }
}

/// Activity state machine
///
/// One handler per activity type; the `match` in [`Dispatcher::dispatch`]
/// is exhaustive, so the compiler enforces coverage of the closed set.
pub struct Dispatcher<S> {
    store: Arc<S>,
}

impl<S: DataStore> Dispatcher<S> {
    /// Create a new dispatcher over a data store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Dispatch a validated activity from `actor`
    pub async fn dispatch(
        &self,
        actor: &str,
        activity: Activity,
    ) -> Result<DispatchOutcome, AppError> {
        match activity {
            Activity::Follow { target } => self.handle_follow(actor, &target).await,
            Activity::Block { target } => self.handle_block(actor, &target).await,
            Activity::Like {
                content_id,
                reaction,
            } => self.handle_like(actor, &content_id, &reaction).await,
            Activity::Unlike { content_id } => self.handle_unlike(actor, &content_id).await,
            Activity::Comment {
                content_id,
                body,
                parent_comment_id,
            } => {
                self.handle_comment(actor, &content_id, &body, parent_comment_id.as_deref())
                    .await
            }
            Activity::Quote { content_id, body } => {
                self.handle_quote(actor, &content_id, &body).await
            }
            Activity::Repost { content_id, note } => {
                self.handle_repost(actor, &content_id, note.as_deref()).await
            }
            Activity::Thread { title, descriptor } => {
                self.handle_thread(actor, &title, &descriptor).await
            }
            Activity::Message { message } => self.handle_message(actor, &message).await,
        }
    }

    /// Follow: add a follower edge; re-follow is a no-op success
    async fn handle_follow(&self, actor: &str, target: &str) -> Result<DispatchOutcome, AppError> {
        if self.store.is_blocked(target, actor).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        self.store.add_follower(target, actor).await?;
        Ok(DispatchOutcome::status(DispatchStatus::Followed))
    }

    /// Block: drop follow edges both directions, add the block edge
    async fn handle_block(&self, actor: &str, target: &str) -> Result<DispatchOutcome, AppError> {
        if actor == target {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        self.store.remove_follows_between(actor, target).await?;
        self.store.add_block(actor, target).await?;
        Ok(DispatchOutcome::status(DispatchStatus::Blocked))
    }

    /// Like: record once per actor and content, bump the counter once
    async fn handle_like(
        &self,
        actor: &str,
        content_id: &str,
        reaction: &str,
    ) -> Result<DispatchOutcome, AppError> {
        if !self.store.can_interact(actor, content_id).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        if let Some(existing) = self.store.find_like(actor, content_id).await? {
            return Ok(DispatchOutcome::created(
                DispatchStatus::AlreadyLiked,
                existing,
            ));
        }

        let like_id = self.store.create_like(actor, content_id, reaction).await?;
        self.store
            .adjust_counter(content_id, InteractionCounter::Like, 1)
            .await?;

        Ok(DispatchOutcome::created(DispatchStatus::Liked, like_id))
    }

    /// Unlike: remove an existing like; missing like is a no-op outcome
    async fn handle_unlike(
        &self,
        actor: &str,
        content_id: &str,
    ) -> Result<DispatchOutcome, AppError> {
        if !self.store.remove_like(actor, content_id).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotFound));
        }

        self.store
            .adjust_counter(content_id, InteractionCounter::Like, -1)
            .await?;

        Ok(DispatchOutcome::status(DispatchStatus::Unliked))
    }

    /// Comment: not idempotent, every call creates a new record
    async fn handle_comment(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<DispatchOutcome, AppError> {
        if !self.store.can_interact(actor, content_id).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        let comment_id = self
            .store
            .create_comment(actor, content_id, body, parent_comment_id)
            .await?;
        self.store
            .adjust_counter(content_id, InteractionCounter::Comment, 1)
            .await?;

        Ok(DispatchOutcome::created(
            DispatchStatus::Commented,
            comment_id,
        ))
    }

    /// Quote: create a quote record referencing the original
    async fn handle_quote(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
    ) -> Result<DispatchOutcome, AppError> {
        if !self.store.can_interact(actor, content_id).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        let quote_id = self.store.create_quote(actor, content_id, body).await?;
        self.store
            .adjust_counter(content_id, InteractionCounter::Quote, 1)
            .await?;

        Ok(DispatchOutcome::created(DispatchStatus::Quoted, quote_id))
    }

    /// Repost: once per actor and content
    async fn handle_repost(
        &self,
        actor: &str,
        content_id: &str,
        note: Option<&str>,
    ) -> Result<DispatchOutcome, AppError> {
        if !self.store.can_interact(actor, content_id).await? {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        if let Some(existing) = self.store.find_repost(actor, content_id).await? {
            return Ok(DispatchOutcome::created(
                DispatchStatus::AlreadyReposted,
                existing,
            ));
        }

        let repost_id = self.store.create_repost(actor, content_id, note).await?;
        self.store
            .adjust_counter(content_id, InteractionCounter::Repost, 1)
            .await?;

        Ok(DispatchOutcome::created(DispatchStatus::Reposted, repost_id))
    }

    /// Thread: descriptor well-formedness is enforced at parse time
    async fn handle_thread(
        &self,
        actor: &str,
        title: &str,
        descriptor: &serde_json::Value,
    ) -> Result<DispatchOutcome, AppError> {
        let thread_id = self.store.create_thread(actor, title, descriptor).await?;
        Ok(DispatchOutcome::created(
            DispatchStatus::ThreadCreated,
            thread_id,
        ))
    }

    /// Message: store the encrypted payload when neither party blocks the other
    async fn handle_message(
        &self,
        actor: &str,
        message: &MessagePayload,
    ) -> Result<DispatchOutcome, AppError> {
        if message.from != actor {
            return Err(AppError::Validation(
                "Message sender must match activity actor".to_string(),
            ));
        }

        if self.store.is_blocked(&message.from, &message.to).await?
            || self.store.is_blocked(&message.to, &message.from).await?
        {
            return Ok(DispatchOutcome::status(DispatchStatus::NotAllowed));
        }

        let record = EncryptedMessage::new(&message.from, &message.to, message.payload.clone());
        let message_id = record.id.clone();
        self.store.create_message(&record).await?;

        Ok(DispatchOutcome::created(
            DispatchStatus::Delivered,
            message_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptedPayload;
    use crate::data::{ContentItem, EntityId, SqliteStore};
    use chrono::Utc;

    async fn test_dispatcher() -> (Dispatcher<SqliteStore>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        (Dispatcher::new(store.clone()), store)
    }

    async fn seed_content(store: &SqliteStore, author: &str) -> String {
        let content = ContentItem {
            id: EntityId::new().0,
            author_address: author.to_string(),
            body: "hello fediverse".to_string(),
            like_count: 0,
            comment_count: 0,
            repost_count: 0,
            quote_count: 0,
            created_at: Utc::now(),
        };
        store.create_content(&content).await.unwrap();
        content.id
    }

    fn message_payload(from: &str, to: &str) -> MessagePayload {
        MessagePayload {
            from: from.to_string(),
            to: to.to_string(),
            payload: EncryptedPayload {
                cipher_text: "Y2lwaGVy".to_string(),
                wrapped_key: "a2V5".to_string(),
                algorithm: "RSA-OAEP+AES256GCM".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn follow_is_idempotent_success() {
        let (dispatcher, store) = test_dispatcher().await;

        let first = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Follow {
                    target: "bob@local.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.status, DispatchStatus::Followed);

        let again = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Follow {
                    target: "bob@local.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(again.status, DispatchStatus::Followed);

        let followers = store.followers_of("bob@local.example").await.unwrap();
        assert_eq!(followers.len(), 1);
    }

    #[tokio::test]
    async fn follow_rejected_when_target_blocks_actor() {
        let (dispatcher, store) = test_dispatcher().await;

        store
            .add_block("bob@local.example", "alice@remote.example")
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Follow {
                    target: "bob@local.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::NotAllowed);
        assert!(store.followers_of("bob@local.example").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn block_drops_follow_edges_in_both_directions() {
        let (dispatcher, store) = test_dispatcher().await;

        store
            .add_follower("bob@local.example", "alice@remote.example")
            .await
            .unwrap();
        store
            .add_follower("alice@remote.example", "bob@local.example")
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Block {
                    target: "bob@local.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Blocked);

        assert!(store.followers_of("bob@local.example").await.unwrap().is_empty());
        assert!(store
            .followers_of("alice@remote.example")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .is_blocked("alice@remote.example", "bob@local.example")
            .await
            .unwrap());

        // Re-block is a no-op success
        let again = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Block {
                    target: "bob@local.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(again.status, DispatchStatus::Blocked);
    }

    #[tokio::test]
    async fn self_block_is_rejected() {
        let (dispatcher, _store) = test_dispatcher().await;

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Block {
                    target: "alice@remote.example".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::NotAllowed);
    }

    #[tokio::test]
    async fn double_like_increments_counter_once() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        let first = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Like {
                    content_id: content_id.clone(),
                    reaction: "❤️".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.status, DispatchStatus::Liked);
        let like_id = first.created_id.clone().expect("like id");

        let second = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Like {
                    content_id: content_id.clone(),
                    reaction: "❤️".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(second.status, DispatchStatus::AlreadyLiked);
        assert_eq!(second.created_id, Some(like_id));

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.like_count, 1);
    }

    #[tokio::test]
    async fn unlike_missing_like_is_not_found_without_mutation() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Unlike {
                    content_id: content_id.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::NotFound);

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.like_count, 0);
    }

    #[tokio::test]
    async fn like_then_unlike_round_trips_the_counter() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Like {
                    content_id: content_id.clone(),
                    reaction: "❤️".to_string(),
                },
            )
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Unlike {
                    content_id: content_id.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Unliked);

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.like_count, 0);
    }

    #[tokio::test]
    async fn comments_are_not_deduplicated() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        for _ in 0..2 {
            let outcome = dispatcher
                .dispatch(
                    "alice@remote.example",
                    Activity::Comment {
                        content_id: content_id.clone(),
                        body: "nice post".to_string(),
                        parent_comment_id: None,
                    },
                )
                .await
                .unwrap();
            assert_eq!(outcome.status, DispatchStatus::Commented);
            assert!(outcome.created_id.is_some());
        }

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.comment_count, 2);
    }

    #[tokio::test]
    async fn duplicate_repost_reports_already_reposted() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        let first = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Repost {
                    content_id: content_id.clone(),
                    note: Some("look at this".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(first.status, DispatchStatus::Reposted);

        let second = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Repost {
                    content_id: content_id.clone(),
                    note: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.status, DispatchStatus::AlreadyReposted);

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.repost_count, 1);
    }

    #[tokio::test]
    async fn quote_increments_quote_counter() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Quote {
                    content_id: content_id.clone(),
                    body: "adding context".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Quoted);

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.quote_count, 1);
    }

    #[tokio::test]
    async fn interactions_rejected_when_author_blocks_actor() {
        let (dispatcher, store) = test_dispatcher().await;
        let content_id = seed_content(&store, "bob@local.example").await;

        store
            .add_block("bob@local.example", "alice@remote.example")
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Like {
                    content_id: content_id.clone(),
                    reaction: "❤️".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::NotAllowed);

        let content = store.get_content(&content_id).await.unwrap().unwrap();
        assert_eq!(content.like_count, 0);
    }

    #[tokio::test]
    async fn thread_descriptor_is_persisted() {
        let (dispatcher, _store) = test_dispatcher().await;

        let descriptor = serde_json::json!({
            "type": "Thread",
            "title": "a thread",
            "posts": ["one", "two"],
        });
        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Thread {
                    title: "a thread".to_string(),
                    descriptor,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::ThreadCreated);
        assert!(outcome.created_id.is_some());
    }

    #[tokio::test]
    async fn message_stored_when_neither_party_blocks() {
        let (dispatcher, store) = test_dispatcher().await;

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Message {
                    message: message_payload("alice@remote.example", "bob@local.example"),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::Delivered);

        let message_id = outcome.created_id.expect("message id");
        assert!(store
            .get_message(&message_id, "bob@local.example")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn message_rejected_when_either_party_blocks() {
        let (dispatcher, store) = test_dispatcher().await;

        store
            .add_block("bob@local.example", "alice@remote.example")
            .await
            .unwrap();

        let outcome = dispatcher
            .dispatch(
                "alice@remote.example",
                Activity::Message {
                    message: message_payload("alice@remote.example", "bob@local.example"),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, DispatchStatus::NotAllowed);
        assert_eq!(store.unread_count("bob@local.example").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn message_sender_must_match_actor() {
        let (dispatcher, _store) = test_dispatcher().await;

        let result = dispatcher
            .dispatch(
                "mallory@remote.example",
                Activity::Message {
                    message: message_payload("alice@remote.example", "bob@local.example"),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
