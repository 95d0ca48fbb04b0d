//! # Domain Models
//!
//! These structs represent the core entities of anonboard.
//! A `Thread` owns its `Reply` list; replies have no lifecycle of their own.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Text a reply is overwritten with when its author deletes it.
pub const DELETED_TEXT: &str = "[deleted]";

/// How many threads the board listing returns.
pub const RECENT_THREAD_LIMIT: i64 = 10;

/// How many trailing replies each thread carries in the board listing.
pub const RECENT_REPLY_LIMIT: i64 = 3;

/// Current time at the precision the store keeps (microseconds).
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Parses an identifier taken from a request body or query string.
pub fn parse_id(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::ValidationError(format!("invalid {field}: {raw:?}")))
}

/// A top-level post on a board, stored together with its replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Board name; any string is accepted
    pub board: String,
    pub text: String,
    /// Stored form of the delete password (a PHC hash string)
    pub delete_password: String,
    pub created_on: DateTime<Utc>,
    /// The timestamp used for sorting threads by activity
    pub bumped_on: DateTime<Utc>,
    pub reported: bool,
    pub replies: Vec<Reply>,
}

impl Thread {
    pub fn new(board: &str, text: String, delete_password: String) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::now_v7(),
            board: board.to_string(),
            text,
            delete_password,
            created_on: now,
            bumped_on: now,
            reported: false,
            replies: Vec::new(),
        }
    }

    pub fn reply(&self, id: Uuid) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == id)
    }
}

/// A sub-post embedded in exactly one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub text: String,
    pub delete_password: String,
    pub created_on: DateTime<Utc>,
    pub reported: bool,
}

impl Reply {
    pub fn new(text: String, delete_password: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            text,
            delete_password,
            created_on: timestamp_now(),
            reported: false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.text == DELETED_TEXT
    }
}

/// Public shape of a thread: no password, no report flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub text: String,
    pub created_on: DateTime<Utc>,
    pub bumped_on: DateTime<Utc>,
    pub replies: Vec<ReplyView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub text: String,
    pub created_on: DateTime<Utc>,
}

impl From<&Reply> for ReplyView {
    fn from(reply: &Reply) -> Self {
        Self {
            id: reply.id,
            text: reply.text.clone(),
            created_on: reply.created_on,
        }
    }
}

impl ThreadView {
    /// Board-listing form: only the last `RECENT_REPLY_LIMIT` replies, oldest first.
    pub fn recent(thread: &Thread) -> Self {
        let skip = thread
            .replies
            .len()
            .saturating_sub(RECENT_REPLY_LIMIT as usize);
        Self::with_replies(thread, &thread.replies[skip..])
    }

    /// Thread-page form: every reply.
    pub fn full(thread: &Thread) -> Self {
        Self::with_replies(thread, &thread.replies)
    }

    fn with_replies(thread: &Thread, replies: &[Reply]) -> Self {
        Self {
            id: thread.id,
            text: thread.text.clone(),
            created_on: thread.created_on,
            bumped_on: thread.bumped_on,
            replies: replies.iter().map(ReplyView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread_with_replies(n: usize) -> Thread {
        let mut thread = Thread::new("test", "op".into(), "hash".into());
        for i in 0..n {
            thread.replies.push(Reply::new(format!("reply {i}"), "hash".into()));
        }
        thread
    }

    #[test]
    fn new_thread_starts_unbumped_and_empty() {
        let thread = Thread::new("b", "hello".into(), "hash".into());
        assert_eq!(thread.created_on, thread.bumped_on);
        assert!(!thread.reported);
        assert!(thread.replies.is_empty());
        assert_eq!(thread.board, "b");
    }

    #[test]
    fn recent_view_keeps_last_three_in_order() {
        let thread = thread_with_replies(5);
        let view = ThreadView::recent(&thread);
        let texts: Vec<_> = view.replies.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["reply 2", "reply 3", "reply 4"]);
    }

    #[test]
    fn recent_view_with_few_replies_keeps_all() {
        let view = ThreadView::recent(&thread_with_replies(2));
        assert_eq!(view.replies.len(), 2);
    }

    #[test]
    fn full_view_keeps_every_reply() {
        let view = ThreadView::full(&thread_with_replies(7));
        assert_eq!(view.replies.len(), 7);
    }

    #[test]
    fn views_hide_password_and_report_flag() {
        let thread = thread_with_replies(1);
        let json = serde_json::to_value(ThreadView::full(&thread)).unwrap();
        assert!(json.get("_id").is_some());
        assert!(json.get("delete_password").is_none());
        assert!(json.get("reported").is_none());
        assert!(json["replies"][0].get("delete_password").is_none());
        assert!(json["replies"][0].get("reported").is_none());
    }

    #[test]
    fn stored_thread_serializes_with_underscore_id() {
        let thread = Thread::new("b", "x".into(), "hash".into());
        let json = serde_json::to_value(&thread).unwrap();
        assert_eq!(json["_id"], thread.id.to_string());
        assert_eq!(json["replies"], serde_json::json!([]));
        assert_eq!(json["reported"], false);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(
            parse_id("threadId", "thread_id"),
            Err(AppError::ValidationError(_))
        ));
        let id = Uuid::now_v7();
        assert_eq!(parse_id(&id.to_string(), "thread_id").unwrap(), id);
    }
}
