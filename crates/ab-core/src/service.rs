//! # BoardService
//!
//! Coordinates the persistence and password ports for each board operation.
//! Handlers call into this; it never touches HTTP types.

use std::sync::Arc;

use anyhow::Context;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    Reply, Thread, ThreadView, DELETED_TEXT, RECENT_REPLY_LIMIT, RECENT_THREAD_LIMIT,
};
use crate::traits::{PasswordHasher, ThreadRepo};

/// Explicitly constructed store + hasher handle, shared by all requests.
#[derive(Clone)]
pub struct BoardService {
    repo: Arc<dyn ThreadRepo>,
    hasher: Arc<dyn PasswordHasher>,
}

impl BoardService {
    pub fn new(repo: Arc<dyn ThreadRepo>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repo, hasher }
    }

    pub async fn create_thread(
        &self,
        board: &str,
        text: String,
        delete_password: String,
    ) -> Result<Thread> {
        let hash = self.hash_password(delete_password).await?;
        let thread = Thread::new(board, text, hash);
        self.repo.insert_thread(&thread).await?;

        tracing::info!(board, thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    pub async fn add_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        text: String,
        delete_password: String,
    ) -> Result<Reply> {
        let hash = self.hash_password(delete_password).await?;
        let reply = self
            .repo
            .append_reply(board, thread_id, Reply::new(text, hash))
            .await?
            .ok_or(AppError::NotFound("Thread", thread_id))?;

        tracing::info!(board, %thread_id, reply_id = %reply.id, "reply appended");
        Ok(reply)
    }

    pub async fn recent_threads(&self, board: &str) -> Result<Vec<ThreadView>> {
        let threads = self
            .repo
            .list_recent_threads(board, RECENT_THREAD_LIMIT, RECENT_REPLY_LIMIT)
            .await?;
        Ok(threads.iter().map(ThreadView::recent).collect())
    }

    pub async fn thread_with_replies(&self, board: &str, thread_id: Uuid) -> Result<ThreadView> {
        let thread = self.load_thread(board, thread_id).await?;
        Ok(ThreadView::full(&thread))
    }

    pub async fn delete_thread(
        &self,
        board: &str,
        thread_id: Uuid,
        delete_password: String,
    ) -> Result<()> {
        let thread = self.load_thread(board, thread_id).await?;
        if !self
            .verify_password(delete_password, thread.delete_password)
            .await?
        {
            tracing::debug!(board, %thread_id, "thread delete rejected");
            return Err(AppError::IncorrectPassword);
        }

        // A concurrent delete may have won the race; that still counts as gone.
        if !self.repo.delete_thread(board, thread_id).await? {
            return Err(AppError::NotFound("Thread", thread_id));
        }
        tracing::info!(board, %thread_id, "thread deleted");
        Ok(())
    }

    /// Tombstones a reply: only its text changes.
    pub async fn delete_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        reply_id: Uuid,
        delete_password: String,
    ) -> Result<()> {
        let thread = self.load_thread(board, thread_id).await?;
        let stored = thread
            .reply(reply_id)
            .ok_or(AppError::NotFound("Reply", reply_id))?
            .delete_password
            .clone();

        if !self.verify_password(delete_password, stored).await? {
            tracing::debug!(board, %thread_id, %reply_id, "reply delete rejected");
            return Err(AppError::IncorrectPassword);
        }

        if !self
            .repo
            .set_reply_text(board, thread_id, reply_id, DELETED_TEXT)
            .await?
        {
            return Err(AppError::NotFound("Reply", reply_id));
        }
        tracing::info!(board, %thread_id, %reply_id, "reply tombstoned");
        Ok(())
    }

    pub async fn report_thread(&self, board: &str, thread_id: Uuid) -> Result<()> {
        if !self.repo.report_thread(board, thread_id).await? {
            return Err(AppError::NotFound("Thread", thread_id));
        }
        tracing::warn!(board, %thread_id, "thread reported");
        Ok(())
    }

    pub async fn report_reply(&self, board: &str, thread_id: Uuid, reply_id: Uuid) -> Result<()> {
        let thread = self.load_thread(board, thread_id).await?;
        if thread.reply(reply_id).is_none() {
            return Err(AppError::NotFound("Reply", reply_id));
        }

        if !self.repo.report_reply(board, thread_id, reply_id).await? {
            return Err(AppError::NotFound("Reply", reply_id));
        }
        tracing::warn!(board, %thread_id, %reply_id, "reply reported");
        Ok(())
    }

    async fn load_thread(&self, board: &str, thread_id: Uuid) -> Result<Thread> {
        self.repo
            .get_thread(board, thread_id)
            .await?
            .ok_or(AppError::NotFound("Thread", thread_id))
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task failed")??;
        Ok(hash)
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .context("password verification task failed")?;
        Ok(matches)
    }
}
