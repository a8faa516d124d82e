use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    let cycle_running = state.monitor.is_running();

    if db_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "cycle_running": cycle_running })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "db": "disconnected", "cycle_running": cycle_running })),
        )
    }
}
