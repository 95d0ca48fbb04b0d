//! anonboard/crates/ab-api/src/middleware.rs Middleware
//!
//! Request logging, CORS and response hardening headers.

use std::time::Duration;

use axum::http::header::{
    CONTENT_TYPE, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_FRAME_OPTIONS,
};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{HttpMakeClassifier, TraceLayer};

/// One span per request: method, uri, status, latency.
pub fn standard_middleware() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
}

// The API is meant to be called from any origin.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Frame only from the same origin, no DNS prefetch, same-origin referrers.
pub fn security_headers() -> [SetResponseHeaderLayer<HeaderValue>; 4] {
    [
        (X_FRAME_OPTIONS, "SAMEORIGIN"),
        (X_DNS_PREFETCH_CONTROL, "off"),
        (REFERRER_POLICY, "same-origin"),
        (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    ]
    .map(|(name, value)| SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value)))
}
