//! Operation metrics, exposed in Prometheus format at `/metrics`.
//!
//! Handlers call the `record_*` helpers on their way out rather than
//! sprinkling counter updates mid-flow.

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global Prometheus recorder. Call once at startup; the
/// returned handle renders the exposition text.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Per-request counter and latency histogram, labeled by matched route.
pub async fn track_http(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!(
        "http.requests",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    histogram!("http.request.duration", "method" => method, "path" => path)
        .record(start.elapsed().as_secs_f64());

    response
}

pub fn record_register_attempt() {
    counter!("auth.register.requests").increment(1);
}

pub fn record_register_success(elapsed: Duration) {
    counter!("auth.register.success").increment(1);
    histogram!("auth.register.duration").record(elapsed.as_secs_f64());
}

pub fn record_register_failure() {
    counter!("auth.register.failure").increment(1);
}

pub fn record_login_success(elapsed: Duration) {
    counter!("auth.login.success").increment(1);
    histogram!("auth.login.duration").record(elapsed.as_secs_f64());
}

pub fn record_login_failure() {
    counter!("auth.login.failure").increment(1);
}

pub fn record_refresh_success() {
    counter!("auth.refresh.success").increment(1);
}

pub fn record_refresh_failure() {
    counter!("auth.refresh.failure").increment(1);
}

pub fn record_logout() {
    counter!("auth.logout.requests").increment(1);
}

pub fn record_password_reset_request() {
    counter!("auth.password_reset.requests").increment(1);
}

pub fn session_opened() {
    gauge!("auth.sessions.active").increment(1.0);
}

pub fn session_closed() {
    gauge!("auth.sessions.active").decrement(1.0);
}
