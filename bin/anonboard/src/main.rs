//! # anonboard binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ab_api::AppState;
use ab_config::{LogFormat, Settings};
use ab_core::BoardService;
use ab_selftest::ReportHandle;
use anyhow::Context;
use axum::Router;
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use ab_db_sqlite::SqliteThreadRepo;

#[cfg(feature = "auth-argon2")]
use ab_auth_argon2::Argon2Hasher;

#[cfg(not(feature = "db-sqlite"))]
compile_error!("anonboard needs a store backend: enable the `db-sqlite` feature");

#[cfg(not(feature = "auth-argon2"))]
compile_error!("anonboard needs a password hasher: enable the `auth-argon2` feature");

/// Gives the listener a moment before the self-test starts hitting it.
const SELF_TEST_DELAY: Duration = Duration::from_millis(1500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(settings.log_format);
    if let Some(path) = &settings.env_file {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    // 1. Open the store; no listener until this succeeds
    let repo = Arc::new(
        SqliteThreadRepo::connect(
            settings.database_url.expose_secret(),
            settings.db_max_connections,
        )
        .await
        .context("store unavailable, refusing to start")?,
    );

    // 2. Password hashing
    let hasher = Argon2Hasher::new(settings.hash_memory_kib, settings.hash_iterations)?;

    // 3. Wire the service into the router
    let service = BoardService::new(repo.clone(), Arc::new(hasher));
    let report = ReportHandle::default();
    let app = build_app(
        AppState { service },
        &settings.public_dir,
        settings.self_test.then(|| report.clone()),
    );

    let listener = TcpListener::bind(settings.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr()))?;
    let addr = listener.local_addr()?;
    tracing::info!("anonboard listening on http://{addr}");

    if settings.self_test {
        let target = self_test_target(addr);
        tokio::spawn(async move {
            tokio::time::sleep(SELF_TEST_DELAY).await;
            ab_selftest::run(&format!("http://{target}"), &report).await;
        });
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    repo.close().await;
    tracing::info!("anonboard stopped");
    Ok(())
}

/// The board routes, plus the self-test report when a handle is given,
/// all behind the same middleware stack.
fn build_app(state: AppState, public_dir: &Path, report: Option<ReportHandle>) -> Router {
    let mut app = ab_api::routes(state, public_dir);
    if let Some(report) = report {
        app = app.merge(ab_selftest::routes(report));
    }
    ab_api::with_middleware(app)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// A wildcard bind address is not dialable; talk to loopback instead.
fn self_test_target(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
    } else {
        addr
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
