//! # ab-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `ab-core` domain models. A thread document is spread over one
//! `threads` row and its ordered `replies` rows; every method runs in a
//! single transaction so readers never see half a document.

use std::str::FromStr;

use ab_core::models::{Reply, Thread};
use ab_core::traits::ThreadRepo;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

static MIGRATOR: Migrator = sqlx::migrate!();

/// SQLite's "no limit" value for `LIMIT`.
const ALL_ROWS: i64 = -1;

pub struct SqliteThreadRepo {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: Uuid,
    board: String,
    text: String,
    delete_password: String,
    created_on: i64,
    bumped_on: i64,
    reported: bool,
}

#[derive(sqlx::FromRow)]
struct ReplyRow {
    id: Uuid,
    text: String,
    delete_password: String,
    created_on: i64,
    reported: bool,
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(micros: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .with_context(|| format!("stored timestamp out of range: {micros}"))
}

impl ThreadRow {
    fn into_thread(self, replies: Vec<Reply>) -> anyhow::Result<Thread> {
        Ok(Thread {
            id: self.id,
            board: self.board,
            text: self.text,
            delete_password: self.delete_password,
            created_on: from_micros(self.created_on)?,
            bumped_on: from_micros(self.bumped_on)?,
            reported: self.reported,
            replies,
        })
    }
}

impl TryFrom<ReplyRow> for Reply {
    type Error = anyhow::Error;

    fn try_from(row: ReplyRow) -> anyhow::Result<Self> {
        Ok(Reply {
            id: row.id,
            text: row.text,
            delete_password: row.delete_password,
            created_on: from_micros(row.created_on)?,
            reported: row.reported,
        })
    }
}

impl SqliteThreadRepo {
    /// Opens the pool and brings the schema up to date.
    ///
    /// In-memory databases live and die with a single connection, so the
    /// pool is pinned to one connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .context("invalid sqlite connection string")?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("failed to open sqlite database")?;
        MIGRATOR
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        tracing::info!(in_memory, "sqlite store ready");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn fetch_replies(
        conn: &mut SqliteConnection,
        thread_id: Uuid,
        last_n: i64,
    ) -> anyhow::Result<Vec<Reply>> {
        let mut rows = sqlx::query_as::<_, ReplyRow>(
            "SELECT id, text, delete_password, created_on, reported FROM replies \
             WHERE thread_id = ? ORDER BY position DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(last_n)
        .fetch_all(&mut *conn)
        .await?;

        rows.reverse();
        rows.into_iter().map(Reply::try_from).collect()
    }
}

#[async_trait]
impl ThreadRepo for SqliteThreadRepo {
    async fn insert_thread(&self, thread: &Thread) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO threads (id, board, text, delete_password, created_on, bumped_on, reported) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(thread.id)
        .bind(&thread.board)
        .bind(&thread.text)
        .bind(&thread.delete_password)
        .bind(to_micros(thread.created_on))
        .bind(to_micros(thread.bumped_on))
        .bind(thread.reported)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_thread(&self, board: &str, id: Uuid) -> anyhow::Result<Option<Thread>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ThreadRow>(
            "SELECT id, board, text, delete_password, created_on, bumped_on, reported \
             FROM threads WHERE id = ? AND board = ?",
        )
        .bind(id)
        .bind(board)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let replies = Self::fetch_replies(&mut *tx, id, ALL_ROWS).await?;
        tx.commit().await?;

        row.into_thread(replies).map(Some)
    }

    /// Ties on `bumped_on` fall back to id order; v7 ids sort by creation time.
    async fn list_recent_threads(
        &self,
        board: &str,
        limit: i64,
        replies_per_thread: i64,
    ) -> anyhow::Result<Vec<Thread>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, ThreadRow>(
            "SELECT id, board, text, delete_password, created_on, bumped_on, reported \
             FROM threads WHERE board = ? ORDER BY bumped_on DESC, id DESC LIMIT ?",
        )
        .bind(board)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in rows {
            let replies = Self::fetch_replies(&mut *tx, row.id, replies_per_thread).await?;
            threads.push(row.into_thread(replies)?);
        }
        tx.commit().await?;

        Ok(threads)
    }

    /// The bump runs first so the write lock is taken before anything is read;
    /// concurrent appends to one thread serialize on it instead of racing.
    async fn append_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        mut reply: Reply,
    ) -> anyhow::Result<Option<Reply>> {
        let mut tx = self.pool.begin().await?;

        let bumped_on: Option<i64> = sqlx::query_scalar(
            "UPDATE threads SET bumped_on = MAX(bumped_on, ?) \
             WHERE id = ? AND board = ? RETURNING bumped_on",
        )
        .bind(to_micros(reply.created_on))
        .bind(thread_id)
        .bind(board)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(bumped_on) = bumped_on else {
            return Ok(None);
        };
        reply.created_on = from_micros(bumped_on)?;

        sqlx::query(
            "INSERT INTO replies (id, thread_id, position, text, delete_password, created_on, reported) \
             VALUES (?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM replies WHERE thread_id = ?), ?, ?, ?, ?)",
        )
        .bind(reply.id)
        .bind(thread_id)
        .bind(thread_id)
        .bind(&reply.text)
        .bind(&reply.delete_password)
        .bind(bumped_on)
        .bind(reply.reported)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reply))
    }

    async fn delete_thread(&self, board: &str, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM threads WHERE id = ? AND board = ?")
            .bind(id)
            .bind(board)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted > 0 {
            sqlx::query("DELETE FROM replies WHERE thread_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn set_reply_text(
        &self,
        board: &str,
        thread_id: Uuid,
        reply_id: Uuid,
        text: &str,
    ) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            "UPDATE replies SET text = ? WHERE id = ? \
             AND thread_id = (SELECT id FROM threads WHERE id = ? AND board = ?)",
        )
        .bind(text)
        .bind(reply_id)
        .bind(thread_id)
        .bind(board)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn report_thread(&self, board: &str, id: Uuid) -> anyhow::Result<bool> {
        let updated = sqlx::query("UPDATE threads SET reported = 1 WHERE id = ? AND board = ?")
            .bind(id)
            .bind(board)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated > 0)
    }

    async fn report_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        reply_id: Uuid,
    ) -> anyhow::Result<bool> {
        let updated = sqlx::query(
            "UPDATE replies SET reported = 1 WHERE id = ? \
             AND thread_id = (SELECT id FROM threads WHERE id = ? AND board = ?)",
        )
        .bind(reply_id)
        .bind(thread_id)
        .bind(board)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ab_core::models::DELETED_TEXT;
    use chrono::Duration;

    async fn repo() -> SqliteThreadRepo {
        SqliteThreadRepo::connect("sqlite::memory:", 1).await.unwrap()
    }

    async fn seeded_thread(repo: &SqliteThreadRepo, board: &str) -> Thread {
        let thread = Thread::new(board, "op".into(), "pw".into());
        repo.insert_thread(&thread).await.unwrap();
        thread
    }

    async fn reply(repo: &SqliteThreadRepo, board: &str, thread_id: Uuid, text: &str) -> Reply {
        repo.append_reply(board, thread_id, Reply::new(text.into(), "rpw".into()))
            .await
            .unwrap()
            .expect("thread exists")
    }

    #[tokio::test]
    async fn test_create_and_get_thread() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;

        let stored = repo.get_thread("test", thread.id).await.unwrap();
        assert_eq!(stored, Some(thread));
    }

    #[tokio::test]
    async fn thread_is_invisible_from_other_boards() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;

        assert!(repo.get_thread("other", thread.id).await.unwrap().is_none());
        let appended = repo
            .append_reply("other", thread.id, Reply::new("r".into(), "p".into()))
            .await
            .unwrap();
        assert!(appended.is_none());
        assert!(!repo.report_thread("other", thread.id).await.unwrap());
        assert!(!repo.delete_thread("other", thread.id).await.unwrap());
    }

    #[tokio::test]
    async fn append_reply_bumps_thread() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;

        let first = reply(&repo, "test", thread.id, "one").await;
        let second = reply(&repo, "test", thread.id, "two").await;

        let stored = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert_eq!(stored.bumped_on, second.created_on);
        assert!(stored.bumped_on >= stored.created_on);
        assert!(second.created_on >= first.created_on);
        let texts: Vec<_> = stored.replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["one", "two"]);
    }

    #[tokio::test]
    async fn bump_never_moves_backwards() {
        let repo = repo().await;
        let mut thread = Thread::new("test", "op".into(), "pw".into());
        thread.bumped_on += Duration::hours(1);
        repo.insert_thread(&thread).await.unwrap();

        let r = reply(&repo, "test", thread.id, "late").await;
        assert_eq!(r.created_on, thread.bumped_on);

        let stored = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert_eq!(stored.bumped_on, thread.bumped_on);
        assert_eq!(stored.replies[0].created_on, r.created_on);
    }

    #[tokio::test]
    async fn recent_threads_are_limited_and_ordered_by_bump() {
        let repo = repo().await;
        let mut ids = Vec::new();
        for _ in 0..12 {
            ids.push(seeded_thread(&repo, "test").await.id);
        }
        seeded_thread(&repo, "elsewhere").await;

        // Bumping the oldest thread moves it to the front.
        reply(&repo, "test", ids[0], "bump").await;

        let threads = repo.list_recent_threads("test", 10, 3).await.unwrap();
        assert_eq!(threads.len(), 10);
        assert_eq!(threads[0].id, ids[0]);
        assert!(threads.iter().all(|t| t.board == "test"));
        for pair in threads.windows(2) {
            assert!(pair[0].bumped_on >= pair[1].bumped_on);
        }
    }

    #[tokio::test]
    async fn recent_threads_carry_last_replies_in_order() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;
        for i in 0..5 {
            reply(&repo, "test", thread.id, &format!("r{i}")).await;
        }

        let threads = repo.list_recent_threads("test", 10, 3).await.unwrap();
        let texts: Vec<_> = threads[0].replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["r2", "r3", "r4"]);

        let full = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert_eq!(full.replies.len(), 5);
    }

    #[tokio::test]
    async fn delete_thread_removes_replies() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;
        reply(&repo, "test", thread.id, "gone soon").await;

        assert!(repo.delete_thread("test", thread.id).await.unwrap());
        assert!(repo.get_thread("test", thread.id).await.unwrap().is_none());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replies")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(!repo.delete_thread("test", thread.id).await.unwrap());
    }

    #[tokio::test]
    async fn tombstone_only_changes_text() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;
        let first = reply(&repo, "test", thread.id, "keep").await;
        let target = reply(&repo, "test", thread.id, "remove me").await;
        reply(&repo, "test", thread.id, "keep too").await;

        assert!(repo
            .set_reply_text("test", thread.id, target.id, DELETED_TEXT)
            .await
            .unwrap());

        let stored = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert_eq!(stored.replies.len(), 3);
        assert_eq!(stored.replies[0], first);
        let tombstone = &stored.replies[1];
        assert_eq!(tombstone.id, target.id);
        assert_eq!(tombstone.text, DELETED_TEXT);
        assert_eq!(tombstone.created_on, target.created_on);
        assert_eq!(tombstone.delete_password, target.delete_password);
    }

    #[tokio::test]
    async fn reports_are_idempotent() {
        let repo = repo().await;
        let thread = seeded_thread(&repo, "test").await;
        let r = reply(&repo, "test", thread.id, "r").await;

        for _ in 0..2 {
            assert!(repo.report_thread("test", thread.id).await.unwrap());
            assert!(repo.report_reply("test", thread.id, r.id).await.unwrap());
        }

        let stored = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert!(stored.reported);
        assert!(stored.replies[0].reported);
        assert!(!repo
            .report_reply("test", thread.id, Uuid::now_v7())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn concurrent_appends_on_a_shared_pool_serialize() {
        const APPENDS: usize = 50;

        let path = std::env::temp_dir().join(format!("ab-db-sqlite-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let repo = Arc::new(SqliteThreadRepo::connect(&url, 5).await.unwrap());
        let thread = seeded_thread(&repo, "test").await;

        let tasks: Vec<_> = (0..APPENDS)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.append_reply("test", thread.id, Reply::new(format!("r{i}"), "p".into()))
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let positions: Vec<i64> =
            sqlx::query_scalar("SELECT position FROM replies WHERE thread_id = ? ORDER BY position")
                .bind(thread.id)
                .fetch_all(&repo.pool)
                .await
                .unwrap();
        assert_eq!(positions, (0..APPENDS as i64).collect::<Vec<_>>());

        let stored = repo.get_thread("test", thread.id).await.unwrap().unwrap();
        assert_eq!(stored.replies.len(), APPENDS);
        for pair in stored.replies.windows(2) {
            assert!(pair[0].created_on <= pair[1].created_on);
        }
        assert_eq!(Some(stored.bumped_on), stored.replies.last().map(|r| r.created_on));

        repo.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
