//! # ab-selftest
//!
//! A fixed battery of HTTP-level checks run against a live server, plus the
//! `/_api/self-test` route that exposes the latest outcome.
//!
//! Checks run in order and share state (the thread and reply they create),
//! so a failure early on usually fails the checks that depend on it.

use std::sync::Arc;

use anyhow::{ensure, Context};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelfTestReport {
    pub finished: bool,
    pub checks: Vec<CheckOutcome>,
}

impl SelfTestReport {
    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.finished && self.checks.iter().all(|c| c.passed)
    }
}

/// Shared, cheaply cloneable view of the latest report.
#[derive(Clone, Default)]
pub struct ReportHandle(Arc<RwLock<SelfTestReport>>);

impl ReportHandle {
    pub async fn snapshot(&self) -> SelfTestReport {
        self.0.read().await.clone()
    }

    async fn record(&self, name: &'static str, result: anyhow::Result<()>) {
        let outcome = match result {
            Ok(()) => {
                tracing::info!(check = name, "self-test passed");
                CheckOutcome { name, passed: true, detail: None }
            }
            Err(e) => {
                tracing::warn!(check = name, error = %format!("{e:#}"), "self-test failed");
                CheckOutcome { name, passed: false, detail: Some(format!("{e:#}")) }
            }
        };
        self.0.write().await.checks.push(outcome);
    }

    async fn finish(&self) {
        let mut report = self.0.write().await;
        report.finished = true;
        tracing::info!(
            passed = report.passed(),
            total = report.checks.len(),
            "self-test run finished"
        );
    }
}

pub fn routes(handle: ReportHandle) -> Router {
    Router::new()
        .route("/_api/self-test", get(report))
        .with_state(handle)
}

async fn report(State(handle): State<ReportHandle>) -> Json<SelfTestReport> {
    Json(handle.snapshot().await)
}

/// Runs every check against `base_url` (e.g. `http://127.0.0.1:3000`).
///
/// Checks use a fresh board name so repeated runs never see each other's data.
pub async fn run(base_url: &str, handle: &ReportHandle) {
    *handle.0.write().await = SelfTestReport::default();

    let mut battery = Battery {
        client: Client::new(),
        base: base_url.trim_end_matches('/').to_string(),
        board: format!("selftest-{}", uuid::Uuid::new_v4().simple()),
        thread_id: String::new(),
        reply_id: String::new(),
    };
    tracing::info!(board = %battery.board, "running self-test");

    handle.record("create a thread", battery.create_thread().await).await;
    handle.record("list recent threads", battery.list_threads().await).await;
    handle.record("reply to a thread", battery.create_reply().await).await;
    handle.record("view a thread with replies", battery.view_thread().await).await;
    handle.record("report a thread", battery.report_thread().await).await;
    handle.record("report a reply", battery.report_reply().await).await;
    handle.record("delete a reply with the wrong password", battery.delete_reply_wrong().await).await;
    handle.record("delete a reply", battery.delete_reply().await).await;
    handle.record("delete a thread with the wrong password", battery.delete_thread_wrong().await).await;
    handle.record("delete a thread", battery.delete_thread().await).await;
    handle.record("deleted thread is gone", battery.thread_gone().await).await;

    handle.finish().await;
}

struct Battery {
    client: Client,
    base: String,
    board: String,
    thread_id: String,
    reply_id: String,
}

impl Battery {
    fn url(&self, kind: &str) -> String {
        format!("{}/api/{kind}/{}", self.base, self.board)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        kind: &str,
        body: Value,
    ) -> anyhow::Result<(StatusCode, String)> {
        let res = self
            .client
            .request(method, self.url(kind))
            .json(&body)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        Ok((status, res.text().await?))
    }

    async fn get_thread(&self) -> anyhow::Result<(StatusCode, Value)> {
        let res = self
            .client
            .get(format!("{}?thread_id={}", self.url("replies"), self.thread_id))
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    async fn create_thread(&mut self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::POST,
                "threads",
                json!({ "text": "self-test thread", "delete_password": "thread-pw" }),
            )
            .await?;
        ensure!(status == StatusCode::OK, "expected 200, got {status}");
        let thread: Value = serde_json::from_str(&body)?;
        self.thread_id = thread["_id"]
            .as_str()
            .context("response has no _id")?
            .to_string();
        ensure!(thread["replies"] == json!([]), "new thread has replies");
        Ok(())
    }

    async fn list_threads(&self) -> anyhow::Result<()> {
        let res = self.client.get(self.url("threads")).send().await?;
        ensure!(res.status() == StatusCode::OK, "expected 200, got {}", res.status());
        let threads: Vec<Value> = res.json().await?;
        ensure!(threads.len() <= 10, "listed {} threads", threads.len());
        let listed = threads
            .iter()
            .find(|t| t["_id"] == self.thread_id.as_str())
            .context("created thread not listed")?;
        for field in ["text", "created_on", "bumped_on", "replies"] {
            ensure!(listed.get(field).is_some(), "listed thread lacks {field}");
        }
        ensure!(listed.get("delete_password").is_none(), "password leaked in listing");
        Ok(())
    }

    async fn create_reply(&mut self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::POST,
                "replies",
                json!({
                    "thread_id": self.thread_id,
                    "text": "self-test reply",
                    "delete_password": "reply-pw"
                }),
            )
            .await?;
        ensure!(status == StatusCode::OK, "expected 200, got {status}");
        let reply: Value = serde_json::from_str(&body)?;
        self.reply_id = reply["_id"]
            .as_str()
            .context("response has no _id")?
            .to_string();
        Ok(())
    }

    async fn view_thread(&self) -> anyhow::Result<()> {
        let (status, thread) = self.get_thread().await?;
        ensure!(status == StatusCode::OK, "expected 200, got {status}");
        let replies = thread["replies"].as_array().context("no replies array")?;
        ensure!(replies.len() == 1, "expected 1 reply, got {}", replies.len());
        ensure!(
            thread["bumped_on"] == replies[0]["created_on"],
            "bumped_on does not match the reply"
        );
        Ok(())
    }

    async fn report_thread(&self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::PUT,
                "threads",
                json!({ "thread_id": self.thread_id }),
            )
            .await?;
        ensure!(
            status == StatusCode::OK && body == "reported",
            "got {status} {body:?}"
        );
        Ok(())
    }

    async fn report_reply(&self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::PUT,
                "replies",
                json!({ "thread_id": self.thread_id, "reply_id": self.reply_id }),
            )
            .await?;
        ensure!(
            status == StatusCode::OK && body == "reported",
            "got {status} {body:?}"
        );
        Ok(())
    }

    async fn delete_reply_wrong(&self) -> anyhow::Result<()> {
        let (status, _) = self
            .send(
                reqwest::Method::DELETE,
                "replies",
                json!({
                    "thread_id": self.thread_id,
                    "reply_id": self.reply_id,
                    "delete_password": "not-it"
                }),
            )
            .await?;
        ensure!(status == StatusCode::FORBIDDEN, "expected 403, got {status}");
        Ok(())
    }

    async fn delete_reply(&self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::DELETE,
                "replies",
                json!({
                    "thread_id": self.thread_id,
                    "reply_id": self.reply_id,
                    "delete_password": "reply-pw"
                }),
            )
            .await?;
        ensure!(
            status == StatusCode::OK && body == "success",
            "got {status} {body:?}"
        );
        let (_, thread) = self.get_thread().await?;
        ensure!(
            thread["replies"][0]["text"] == "[deleted]",
            "reply text was not replaced"
        );
        Ok(())
    }

    async fn delete_thread_wrong(&self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::DELETE,
                "threads",
                json!({ "thread_id": self.thread_id, "delete_password": "not-it" }),
            )
            .await?;
        ensure!(
            status == StatusCode::FORBIDDEN && body == "incorrect password",
            "got {status} {body:?}"
        );
        Ok(())
    }

    async fn delete_thread(&self) -> anyhow::Result<()> {
        let (status, body) = self
            .send(
                reqwest::Method::DELETE,
                "threads",
                json!({ "thread_id": self.thread_id, "delete_password": "thread-pw" }),
            )
            .await?;
        ensure!(
            status == StatusCode::OK && body == "success",
            "got {status} {body:?}"
        );
        Ok(())
    }

    async fn thread_gone(&self) -> anyhow::Result<()> {
        let (status, _) = self.get_thread().await?;
        ensure!(status == StatusCode::NOT_FOUND, "expected 404, got {status}");
        Ok(())
    }
}
