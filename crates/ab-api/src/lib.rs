//! # ab-api
//!
//! The web routing and orchestration layer for anonboard.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::path::Path;

use axum::handler::HandlerWithoutStateExt;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;

pub use handlers::AppState;

/// The eight board API endpoints, to be mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/threads/{board}",
            get(handlers::list_threads)
                .post(handlers::create_thread)
                .put(handlers::report_thread)
                .delete(handlers::delete_thread),
        )
        .route(
            "/replies/{board}",
            get(handlers::view_thread)
                .post(handlers::create_reply)
                .put(handlers::report_reply)
                .delete(handlers::delete_reply),
        )
}

/// Pages, API, static files and the 404 fallback, without middleware.
///
/// `public_dir` is served under `/public`; missing files fall through to the
/// same plain-text 404 as unknown routes.
pub fn routes(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    let serve_dir =
        ServeDir::new(public_dir.as_ref()).not_found_service(handlers::not_found.into_service());

    Router::new()
        .route("/", get(handlers::index))
        .route("/{board}", get(handlers::board_page))
        .route("/{board}/", get(handlers::board_page))
        .route("/b/{board}", get(handlers::board_page))
        .route("/b/{board}/", get(handlers::board_page))
        .route("/b/{board}/{thread_id}", get(handlers::thread_page))
        .nest("/api", api_routes())
        .nest_service("/public", serve_dir)
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Wraps every route of `app`, including ones merged in by the binary,
/// in security headers, CORS and request tracing.
pub fn with_middleware(app: Router) -> Router {
    middleware::security_headers()
        .into_iter()
        .fold(app, |app, layer| app.layer(layer))
        .layer(middleware::cors_policy())
        .layer(middleware::standard_middleware())
}

/// Builds the full application with its middleware applied.
pub fn router(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    with_middleware(routes(state, public_dir))
}
