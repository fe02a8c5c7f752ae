//! SQLite-backed store
//!
//! Reference implementation of the [`DataStore`] contract. All engine
//! state lives in a single SQLite file; every operation is a single
//! statement, matching the single-row atomicity the contract promises.

use std::path::Path;

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite, SqlitePool};

use crate::error::AppError;

use super::models::{ContentItem, EncryptedMessage, EntityId, FederatedIdentity};
use super::store::{DataStore, InteractionCounter};

/// Schema statements executed at connect.
///
/// `IF NOT EXISTS` keeps reconnects idempotent; there is no separate
/// migration pipeline.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS identities (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        domain TEXT NOT NULL,
        public_key_pem TEXT NOT NULL,
        private_key_pem TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (username, domain)
    )",
    "CREATE TABLE IF NOT EXISTS relationships (
        actor_address TEXT NOT NULL,
        target_address TEXT NOT NULL,
        relationship TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (actor_address, target_address, relationship)
    )",
    "CREATE TABLE IF NOT EXISTS blocked_domains (
        domain TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS content (
        id TEXT PRIMARY KEY,
        author_address TEXT NOT NULL,
        body TEXT NOT NULL,
        like_count INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0,
        repost_count INTEGER NOT NULL DEFAULT 0,
        quote_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS likes (
        id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        actor_address TEXT NOT NULL,
        reaction TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (content_id, actor_address)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        actor_address TEXT NOT NULL,
        body TEXT NOT NULL,
        parent_comment_id TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reposts (
        id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        actor_address TEXT NOT NULL,
        note TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (content_id, actor_address)
    )",
    "CREATE TABLE IF NOT EXISTS quotes (
        id TEXT PRIMARY KEY,
        content_id TEXT NOT NULL,
        actor_address TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS threads (
        id TEXT PRIMARY KEY,
        actor_address TEXT NOT NULL,
        title TEXT NOT NULL,
        descriptor TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        from_address TEXT NOT NULL,
        to_address TEXT NOT NULL,
        cipher_text TEXT NOT NULL,
        wrapped_key TEXT NOT NULL,
        algorithm TEXT NOT NULL,
        created_at TEXT NOT NULL,
        read INTEGER NOT NULL DEFAULT 0
    )",
];

/// SQLite connection pool wrapper
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize the schema
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database for tests
    ///
    /// Capped at one connection: each SQLite in-memory connection is its
    /// own database, so a larger pool would shard the data.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

impl DataStore for SqliteStore {
    async fn create_identity(&self, identity: &FederatedIdentity) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO identities
             (id, username, domain, public_key_pem, private_key_pem, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.domain)
        .bind(&identity.public_key_pem)
        .bind(&identity.private_key_pem)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_identity(&self, address: &str) -> Result<Option<FederatedIdentity>, AppError> {
        let Some((username, domain)) = super::models::split_address(address) else {
            return Ok(None);
        };

        let identity = sqlx::query_as::<_, FederatedIdentity>(
            "SELECT id, username, domain, public_key_pem, private_key_pem, created_at
             FROM identities WHERE username = ? AND domain = ?",
        )
        .bind(username)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn get_public_key(&self, address: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .get_identity(address)
            .await?
            .map(|identity| identity.public_key_pem))
    }

    async fn is_domain_blocked(&self, domain: &str) -> Result<bool, AppError> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT domain FROM blocked_domains WHERE domain = ?")
                .bind(domain)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    async fn is_blocked(&self, actor: &str, target: &str) -> Result<bool, AppError> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT actor_address FROM relationships
             WHERE actor_address = ? AND target_address = ? AND relationship = 'block'",
        )
        .bind(actor)
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn can_interact(&self, actor: &str, content_id: &str) -> Result<bool, AppError> {
        let Some(content) = self.get_content(content_id).await? else {
            return Ok(false);
        };

        let author = content.author_address;
        if self.is_blocked(&author, actor).await? || self.is_blocked(actor, &author).await? {
            return Ok(false);
        }

        Ok(true)
    }

    async fn block_domain(&self, domain: &str) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO blocked_domains (domain, created_at) VALUES (?, ?)")
            .bind(domain)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn add_follower(&self, target: &str, follower: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO relationships
             (actor_address, target_address, relationship, created_at)
             VALUES (?, ?, 'follow', ?)",
        )
        .bind(follower)
        .bind(target)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_follower(&self, target: &str, follower: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM relationships
             WHERE actor_address = ? AND target_address = ? AND relationship = 'follow'",
        )
        .bind(follower)
        .bind(target)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn followers_of(&self, target: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT actor_address FROM relationships
             WHERE target_address = ? AND relationship = 'follow'
             ORDER BY created_at DESC",
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("actor_address"))
            .collect())
    }

    async fn add_block(&self, actor: &str, target: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO relationships
             (actor_address, target_address, relationship, created_at)
             VALUES (?, ?, 'block', ?)",
        )
        .bind(actor)
        .bind(target)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_follows_between(&self, a: &str, b: &str) -> Result<(), AppError> {
        sqlx::query(
            "DELETE FROM relationships
             WHERE relationship = 'follow'
               AND ((actor_address = ? AND target_address = ?)
                 OR (actor_address = ? AND target_address = ?))",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_content(&self, content: &ContentItem) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO content
             (id, author_address, body, like_count, comment_count, repost_count, quote_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&content.id)
        .bind(&content.author_address)
        .bind(&content.body)
        .bind(content.like_count)
        .bind(content.comment_count)
        .bind(content.repost_count)
        .bind(content.quote_count)
        .bind(content.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_content(&self, content_id: &str) -> Result<Option<ContentItem>, AppError> {
        let content = sqlx::query_as::<_, ContentItem>(
            "SELECT id, author_address, body, like_count, comment_count,
                    repost_count, quote_count, created_at
             FROM content WHERE id = ?",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(content)
    }

    async fn adjust_counter(
        &self,
        content_id: &str,
        counter: InteractionCounter,
        delta: i64,
    ) -> Result<(), AppError> {
        // Column names come from a closed enum, not caller input.
        let statement = format!(
            "UPDATE content SET {column} = {column} + ? WHERE id = ?",
            column = counter.column()
        );

        sqlx::query(&statement)
            .bind(delta)
            .bind(content_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_like(&self, actor: &str, content_id: &str) -> Result<Option<String>, AppError> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM likes WHERE content_id = ? AND actor_address = ?")
                .bind(content_id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await?;

        Ok(id)
    }

    async fn create_like(
        &self,
        actor: &str,
        content_id: &str,
        reaction: &str,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;

        sqlx::query(
            "INSERT INTO likes (id, content_id, actor_address, reaction, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(content_id)
        .bind(actor)
        .bind(reaction)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn remove_like(&self, actor: &str, content_id: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM likes WHERE content_id = ? AND actor_address = ?")
                .bind(content_id)
                .bind(actor)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_comment(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;

        sqlx::query(
            "INSERT INTO comments (id, content_id, actor_address, body, parent_comment_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(content_id)
        .bind(actor)
        .bind(body)
        .bind(parent_comment_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_repost(&self, actor: &str, content_id: &str) -> Result<Option<String>, AppError> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM reposts WHERE content_id = ? AND actor_address = ?")
                .bind(content_id)
                .bind(actor)
                .fetch_optional(&self.pool)
                .await?;

        Ok(id)
    }

    async fn create_repost(
        &self,
        actor: &str,
        content_id: &str,
        note: Option<&str>,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;

        sqlx::query(
            "INSERT INTO reposts (id, content_id, actor_address, note, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(content_id)
        .bind(actor)
        .bind(note)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_quote(
        &self,
        actor: &str,
        content_id: &str,
        body: &str,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;

        sqlx::query(
            "INSERT INTO quotes (id, content_id, actor_address, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(content_id)
        .bind(actor)
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_thread(
        &self,
        actor: &str,
        title: &str,
        descriptor: &serde_json::Value,
    ) -> Result<String, AppError> {
        let id = EntityId::new().0;

        sqlx::query(
            "INSERT INTO threads (id, actor_address, title, descriptor, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(actor)
        .bind(title)
        .bind(descriptor.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_message(&self, message: &EncryptedMessage) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO messages
             (id, from_address, to_address, cipher_text, wrapped_key, algorithm, created_at, read)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.from_address)
        .bind(&message.to_address)
        .bind(&message.cipher_text)
        .bind(&message.wrapped_key)
        .bind(&message.algorithm)
        .bind(message.created_at)
        .bind(message.read)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_message(
        &self,
        message_id: &str,
        requester: &str,
    ) -> Result<Option<EncryptedMessage>, AppError> {
        let message = sqlx::query_as::<_, EncryptedMessage>(
            "SELECT id, from_address, to_address, cipher_text, wrapped_key,
                    algorithm, created_at, read
             FROM messages
             WHERE id = ? AND (from_address = ? OR to_address = ?)",
        )
        .bind(message_id)
        .bind(requester)
        .bind(requester)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn mark_message_read(&self, message_id: &str, reader: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE messages SET read = 1 WHERE id = ? AND to_address = ?")
            .bind(message_id)
            .bind(reader)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unread_count(&self, address: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE to_address = ? AND read = 0",
        )
        .bind(address)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn conversation(
        &self,
        a: &str,
        b: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EncryptedMessage>, AppError> {
        let messages = sqlx::query_as::<_, EncryptedMessage>(
            "SELECT id, from_address, to_address, cipher_text, wrapped_key,
                    algorithm, created_at, read
             FROM messages
             WHERE (from_address = ? AND to_address = ?)
                OR (from_address = ? AND to_address = ?)
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
