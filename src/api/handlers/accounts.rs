use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::db::{account_repo, alert_repo};
use crate::errors::AppError;
use crate::models::{Account, AlertRecord};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// GET /api/accounts
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Account>>>, AppError> {
    let accounts = account_repo::get_all_accounts(&state.db, params.limit()).await?;
    Ok(Json(ApiResponse::ok(accounts)))
}

/// GET /api/accounts/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Account>>, AppError> {
    let account = account_repo::get_account(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;
    Ok(Json(ApiResponse::ok(account)))
}

/// GET /api/accounts/:id/alerts
pub async fn alerts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<AlertRecord>>>, AppError> {
    let alerts = alert_repo::get_alerts_for_account(&state.db, id, params.limit()).await?;
    Ok(Json(ApiResponse::ok(alerts)))
}
