// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;
use thiserror::Error;

use crate::posts::domain::{ClaimSecret, DayKey, Identity, Post, PostId};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Precondition an update must still satisfy when it reaches the store.
/// Guards are checked in the same statement as the write, so a claim that
/// lands between an edit's read and its write makes the edit miss.
#[derive(Debug, Clone)]
pub enum UpdateGuard {
    Unclaimed,
    ClaimedWith(ClaimSecret),
}

/// Keyed post store.
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: &Post) -> Result<(), RepositoryError>;

    async fn get(&self, id: &PostId) -> Result<Option<Post>, RepositoryError>;

    /// Write `post`'s text and bump `edit_count` by one, if `guard` holds.
    /// Returns the stored row after the write, or `None` if the guard missed.
    async fn update_text(
        &self,
        post: &Post,
        guard: UpdateGuard,
    ) -> Result<Option<Post>, RepositoryError>;

    /// Set the claim secret if the post is still unclaimed.
    async fn set_claim(
        &self,
        id: &PostId,
        secret: &ClaimSecret,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Post>, RepositoryError>;

    /// Newest first.
    async fn list_for_day(&self, day: &DayKey, limit: u32) -> Result<Vec<Post>, RepositoryError>;

    async fn random_unclaimed(&self) -> Result<Option<Post>, RepositoryError>;

    async fn count_for_day(&self, day: &DayKey) -> Result<u64, RepositoryError>;

    async fn count_agent_for_day(&self, day: &DayKey) -> Result<u64, RepositoryError>;

    /// Delete every post whose day precedes `cutoff`. Returns rows deleted.
    async fn purge_before(&self, cutoff: &DayKey) -> Result<u64, RepositoryError>;
}

/// SQLite implementation
pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, topic, body, original_topic, original_body, edit_count, \
                            claim_hash, fingerprint, day_key, created_at, updated_at";

struct PostRow {
    id: String,
    topic: String,
    body: String,
    original_topic: String,
    original_body: String,
    edit_count: u32,
    claim_hash: Option<String>,
    fingerprint: Option<String>,
    day_key: String,
    created_at: String,
    updated_at: String,
}

impl PostRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            topic: row.get(1)?,
            body: row.get(2)?,
            original_topic: row.get(3)?,
            original_body: row.get(4)?,
            edit_count: row.get(5)?,
            claim_hash: row.get(6)?,
            fingerprint: row.get(7)?,
            day_key: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_post(self) -> Result<Post, RepositoryError> {
        let day_key = DayKey::parse(&self.day_key)
            .ok_or_else(|| RepositoryError::Corrupt(format!("bad day_key {}", self.day_key)))?;

        Ok(Post {
            id: PostId::new(self.id),
            topic: self.topic,
            body: self.body,
            original_topic: self.original_topic,
            original_body: self.original_body,
            edit_count: self.edit_count,
            claim_secret: self.claim_hash.map(ClaimSecret::from_hash),
            origin_identity: Identity::from_fingerprint(self.fingerprint),
            day_key,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Fixed-width so `ORDER BY created_at` sorts chronologically.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("bad timestamp {}: {}", raw, e)))
}

fn load(conn: &rusqlite::Connection, id: &str) -> Result<Option<Post>, RepositoryError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            params![id],
            PostRow::from_row,
        )
        .optional()?;

    row.map(PostRow::into_post).transpose()
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn insert(&self, post: &Post) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO posts (id, topic, body, original_topic, original_body, edit_count,
                                claimed, claim_hash, fingerprint, day_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                post.id.as_str(),
                post.topic,
                post.body,
                post.original_topic,
                post.original_body,
                post.edit_count,
                post.is_claimed(),
                post.claim_secret.as_ref().map(|s| s.as_str()),
                post.origin_identity.fingerprint(),
                post.day_key.to_string(),
                format_timestamp(post.created_at),
                format_timestamp(post.updated_at),
            ],
        )?;

        Ok(())
    }

    async fn get(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        load(&conn, id.as_str())
    }

    async fn update_text(
        &self,
        post: &Post,
        guard: UpdateGuard,
    ) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let updated = match &guard {
            UpdateGuard::Unclaimed => conn.execute(
                "UPDATE posts
                 SET topic = ?1, body = ?2, edit_count = edit_count + 1, updated_at = ?3
                 WHERE id = ?4 AND claimed = 0",
                params![
                    post.topic,
                    post.body,
                    format_timestamp(post.updated_at),
                    post.id.as_str()
                ],
            )?,
            UpdateGuard::ClaimedWith(secret) => conn.execute(
                "UPDATE posts
                 SET topic = ?1, body = ?2, edit_count = edit_count + 1, updated_at = ?3
                 WHERE id = ?4 AND claimed = 1 AND claim_hash = ?5",
                params![
                    post.topic,
                    post.body,
                    format_timestamp(post.updated_at),
                    post.id.as_str(),
                    secret.as_str()
                ],
            )?,
        };

        if updated == 0 {
            return Ok(None);
        }
        load(&conn, post.id.as_str())
    }

    async fn set_claim(
        &self,
        id: &PostId,
        secret: &ClaimSecret,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let updated = conn.execute(
            "UPDATE posts
             SET claimed = 1, claim_hash = ?1, updated_at = ?2
             WHERE id = ?3 AND claimed = 0",
            params![secret.as_str(), format_timestamp(updated_at), id.as_str()],
        )?;

        if updated == 0 {
            return Ok(None);
        }
        load(&conn, id.as_str())
    }

    async fn list_for_day(&self, day: &DayKey, limit: u32) -> Result<Vec<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts WHERE day_key = ?1 ORDER BY created_at DESC LIMIT ?2",
            POST_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![day.to_string(), limit], PostRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(PostRow::into_post).collect()
    }

    async fn random_unclaimed(&self) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM posts WHERE claimed = 0 ORDER BY RANDOM() LIMIT 1",
                    POST_COLUMNS
                ),
                [],
                PostRow::from_row,
            )
            .optional()?;

        row.map(PostRow::into_post).transpose()
    }

    async fn count_for_day(&self, day: &DayKey) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE day_key = ?1",
            params![day.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn count_agent_for_day(&self, day: &DayKey) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE day_key = ?1 AND fingerprint IS NULL",
            params![day.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn purge_before(&self, cutoff: &DayKey) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM posts WHERE day_key < ?1",
            params![cutoff.to_string()],
        )?;
        Ok(deleted as u64)
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynPostRepository = Arc<dyn PostRepository>;
