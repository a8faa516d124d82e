use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::CycleSummary;
use crate::services::monitor::MonitorError;
use crate::AppState;

/// POST /api/monitor/run: one monitoring cycle, triggered by the external scheduler.
pub async fn run(State(state): State<AppState>) -> Result<Json<CycleSummary>, AppError> {
    match state.monitor.run_cycle(Utc::now()).await {
        Ok(summary) => Ok(Json(summary)),
        Err(MonitorError::AlreadyRunning) => Err(AppError::Conflict(
            "monitoring cycle already in progress".into(),
        )),
        Err(e @ MonitorError::FetchAccounts(_)) => Err(AppError::Internal(e.into())),
    }
}

/// GET /api/monitor/status
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let last_summary = state.monitor.last_summary().await;
    Json(json!({
        "running": state.monitor.is_running(),
        "last_summary": last_summary,
    }))
}
