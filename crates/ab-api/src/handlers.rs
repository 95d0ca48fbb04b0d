//! # ab-api Handlers
//!
//! This module coordinates the flow between HTTP requests and `BoardService`.
//! Identifiers arrive as strings and are parsed here; the service only sees `Uuid`s.

use ab_core::models::{parse_id, Reply, Thread, ThreadView};
use ab_core::{AppError, BoardService};
use ab_ui::{BoardTemplate, IndexTemplate, ThreadTemplate};
use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde::Deserialize;

use crate::error::{JsonError, TextError};
use crate::extract::{JsonQuery, Payload};

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: BoardService,
}

#[derive(Debug, Deserialize)]
pub struct NewThreadBody {
    pub text: String,
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct NewReplyBody {
    pub thread_id: String,
    pub text: String,
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteThreadBody {
    pub thread_id: String,
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteReplyBody {
    pub thread_id: String,
    pub reply_id: String,
    pub delete_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportThreadBody {
    pub thread_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportReplyBody {
    pub thread_id: String,
    pub reply_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub thread_id: String,
}

// ── Threads ─────────────────────────────────────────────────────────────────

pub async fn create_thread(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<NewThreadBody>,
) -> Result<Json<Thread>, TextError> {
    let thread = state
        .service
        .create_thread(&board, body.text, body.delete_password)
        .await?;
    Ok(Json(thread))
}

pub async fn list_threads(
    State(state): State<AppState>,
    Path(board): Path<String>,
) -> Result<Json<Vec<ThreadView>>, JsonError> {
    Ok(Json(state.service.recent_threads(&board).await?))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<DeleteThreadBody>,
) -> Result<&'static str, TextError> {
    let thread_id = parse_id(&body.thread_id, "thread_id")?;
    state
        .service
        .delete_thread(&board, thread_id, body.delete_password)
        .await?;
    Ok("success")
}

pub async fn report_thread(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<ReportThreadBody>,
) -> Result<&'static str, TextError> {
    let thread_id = parse_id(&body.thread_id, "thread_id")?;
    state.service.report_thread(&board, thread_id).await?;
    Ok("reported")
}

// ── Replies ─────────────────────────────────────────────────────────────────

pub async fn create_reply(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<NewReplyBody>,
) -> Result<Json<Reply>, TextError> {
    let thread_id = parse_id(&body.thread_id, "thread_id")?;
    let reply = state
        .service
        .add_reply(&board, thread_id, body.text, body.delete_password)
        .await?;
    Ok(Json(reply))
}

pub async fn view_thread(
    State(state): State<AppState>,
    Path(board): Path<String>,
    JsonQuery(query): JsonQuery<ThreadQuery>,
) -> Result<Json<ThreadView>, JsonError> {
    let thread_id = parse_id(&query.thread_id, "thread_id")?;
    Ok(Json(
        state.service.thread_with_replies(&board, thread_id).await?,
    ))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<DeleteReplyBody>,
) -> Result<&'static str, TextError> {
    let thread_id = parse_id(&body.thread_id, "thread_id")?;
    let reply_id = parse_id(&body.reply_id, "reply_id")?;
    state
        .service
        .delete_reply(&board, thread_id, reply_id, body.delete_password)
        .await?;
    Ok("success")
}

pub async fn report_reply(
    State(state): State<AppState>,
    Path(board): Path<String>,
    Payload(body): Payload<ReportReplyBody>,
) -> Result<&'static str, TextError> {
    let thread_id = parse_id(&body.thread_id, "thread_id")?;
    let reply_id = parse_id(&body.reply_id, "reply_id")?;
    state
        .service
        .report_reply(&board, thread_id, reply_id)
        .await?;
    Ok("reported")
}

// ── Pages ───────────────────────────────────────────────────────────────────

fn render(template: impl Template) -> Result<Html<String>, TextError> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("template rendering failed: {e}")).into())
}

pub async fn index() -> Result<Html<String>, TextError> {
    render(IndexTemplate { title: "anonboard" })
}

/// Renders the board page (e.g. /b/tech/)
pub async fn board_page(Path(board): Path<String>) -> Result<Html<String>, TextError> {
    render(BoardTemplate::new(&board))
}

/// Renders a specific thread page (e.g. /b/tech/<uuid>)
pub async fn thread_page(
    Path((board, thread_id)): Path<(String, String)>,
) -> Result<Html<String>, TextError> {
    render(ThreadTemplate::new(&board, &thread_id))
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
