use std::collections::HashSet;

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{AlertKind, AlertRecord, NewAlert};

/// Alert kinds already recorded for an account on a given day.
pub async fn get_alert_kinds_on(
    pool: &PgPool,
    account_id: Uuid,
    date: NaiveDate,
) -> anyhow::Result<HashSet<AlertKind>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT alert_type FROM prop_alerts WHERE account_id = $1 AND alert_date = $2",
    )
    .bind(account_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(parse_alert_kinds(account_id, rows.into_iter().map(|(t,)| t)))
}

/// Rows written by other tools may carry types the engine does not know;
/// those never suppress an engine alert.
fn parse_alert_kinds(account_id: Uuid, types: impl IntoIterator<Item = String>) -> HashSet<AlertKind> {
    types
        .into_iter()
        .filter_map(|t| {
            let kind = AlertKind::from_alert_type(&t);
            if kind.is_none() {
                tracing::debug!(account_id = %account_id, alert_type = %t, "Ignoring unknown alert type");
            }
            kind
        })
        .collect()
}

/// Insert an alert unless one of the same type exists for that account and day.
/// Returns `None` when the unique key already existed.
pub async fn insert_alert(
    conn: &mut PgConnection,
    alert: &NewAlert,
) -> anyhow::Result<Option<AlertRecord>> {
    let record = sqlx::query_as::<_, AlertRecord>(
        r#"
        INSERT INTO prop_alerts
            (account_id, alert_type, threshold_pct, current_dd_pct, equity_at_alert, signals_paused, alert_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (account_id, alert_type, alert_date) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(alert.account_id)
    .bind(alert.kind.alert_type())
    .bind(alert.threshold_pct)
    .bind(alert.current_dd_pct)
    .bind(alert.equity_at_alert)
    .bind(alert.signals_paused)
    .bind(alert.alert_date)
    .fetch_optional(conn)
    .await?;

    Ok(record)
}

/// Most recent alerts for an account.
pub async fn get_alerts_for_account(
    pool: &PgPool,
    account_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<AlertRecord>> {
    let alerts = sqlx::query_as::<_, AlertRecord>(
        "SELECT * FROM prop_alerts WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(alerts)
}
