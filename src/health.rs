use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::state::AppState;

/// Liveness: healthy as long as the process answers.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "user-service" }))
}

/// Readiness: probes both stores. A failing probe returns 503 without
/// touching in-flight requests.
#[instrument(skip(state))]
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(e) = sqlx::query("SELECT 1").execute(&state.db).await {
        error!(error = %e, "readiness: database unreachable");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready" })),
        ));
    }

    if let Err(e) = state.sessions.ping().await {
        error!(error = %e, "readiness: session store unreachable");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready" })),
        ));
    }

    Ok(Json(json!({ "status": "ready" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_service_name() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "user-service");
    }
}
