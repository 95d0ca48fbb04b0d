//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Reply, Thread};

/// Data persistence contract for threads and their embedded replies.
///
/// Every lookup is scoped by board: a thread id under the wrong board is
/// reported exactly like a missing thread (`None` / `false`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn insert_thread(&self, thread: &Thread) -> anyhow::Result<()>;

    /// Loads a thread with its full reply sequence.
    async fn get_thread(&self, board: &str, id: Uuid) -> anyhow::Result<Option<Thread>>;

    /// Most recently bumped threads, each carrying at most
    /// `replies_per_thread` trailing replies in creation order.
    async fn list_recent_threads(
        &self,
        board: &str,
        limit: i64,
        replies_per_thread: i64,
    ) -> anyhow::Result<Vec<Thread>>;

    /// Appends a reply and bumps the thread in one atomic step.
    ///
    /// The stored reply is returned; its `created_on` may be raised so the
    /// thread's `bumped_on` never moves backwards.
    async fn append_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        reply: Reply,
    ) -> anyhow::Result<Option<Reply>>;

    /// Removes the thread and every reply it holds.
    async fn delete_thread(&self, board: &str, id: Uuid) -> anyhow::Result<bool>;

    async fn set_reply_text(
        &self,
        board: &str,
        thread_id: Uuid,
        reply_id: Uuid,
        text: &str,
    ) -> anyhow::Result<bool>;

    async fn report_thread(&self, board: &str, id: Uuid) -> anyhow::Result<bool>;

    async fn report_reply(
        &self,
        board: &str,
        thread_id: Uuid,
        reply_id: Uuid,
    ) -> anyhow::Result<bool>;
}

/// Delete-password contract. Only equality semantics matter to callers;
/// the stored form is up to the implementation.
///
/// Both methods may be CPU heavy and are called off the async runtime.
pub trait PasswordHasher: Send + Sync {
    /// Produces the stored form of a delete password.
    fn hash(&self, password: &str) -> anyhow::Result<String>;

    /// Checks a supplied password against a stored form.
    fn verify(&self, password: &str, stored: &str) -> bool;
}
