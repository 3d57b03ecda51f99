//! Commit to notification mapping used to thread replies.
//!
//! When a push notification goes out, every commit in it is recorded with
//! the subject and Message-ID of that email. A later comment on one of those
//! commits looks the record up and replies to the original message.
//!
//! Records are never overwritten: the first notification that mentions a
//! commit owns its thread, and creating a thread for a known commit is a
//! no-op. Both backends make that check-and-insert atomic. Records are
//! never deleted.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::FromRow;

use crate::DbPool;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ThreadRecord {
    pub commit_id: String,
    pub subject: String,
    pub message_id: String,
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Record the thread for a commit. Returns false when one already existed.
    async fn create_thread(&self, commit_id: &str, subject: &str, message_id: &str)
        -> Result<bool>;

    /// The thread for a commit, if any notification mentioned it before.
    async fn lookup_thread(&self, commit_id: &str) -> Result<Option<ThreadRecord>>;
}

/// Thread store backed by the SQLite `threads` table
pub struct SqliteThreadStore {
    db: DbPool,
}

impl SqliteThreadStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn create_thread(
        &self,
        commit_id: &str,
        subject: &str,
        message_id: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO threads (commit_id, subject, message_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(commit_id) DO NOTHING
            "#,
        )
        .bind(commit_id)
        .bind(subject)
        .bind(message_id)
        .bind(&now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn lookup_thread(&self, commit_id: &str) -> Result<Option<ThreadRecord>> {
        let record = sqlx::query_as::<_, ThreadRecord>(
            "SELECT commit_id, subject, message_id FROM threads WHERE commit_id = ?",
        )
        .bind(commit_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }
}

/// In-process thread store; threads are lost on restart
#[derive(Default)]
pub struct MemoryThreadStore {
    threads: DashMap<String, ThreadRecord>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn create_thread(
        &self,
        commit_id: &str,
        subject: &str,
        message_id: &str,
    ) -> Result<bool> {
        let mut created = false;
        self.threads
            .entry(commit_id.to_string())
            .or_insert_with(|| {
                created = true;
                ThreadRecord {
                    commit_id: commit_id.to_string(),
                    subject: subject.to_string(),
                    message_id: message_id.to_string(),
                }
            });
        Ok(created)
    }

    async fn lookup_thread(&self, commit_id: &str) -> Result<Option<ThreadRecord>> {
        Ok(self.threads.get(commit_id).map(|r| r.value().clone()))
    }
}
