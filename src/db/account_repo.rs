use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{Account, AccountPatch};

/// All accounts currently under risk management.
pub async fn get_active_accounts(pool: &PgPool) -> anyhow::Result<Vec<Account>> {
    let accounts = sqlx::query_as::<_, Account>(
        "SELECT * FROM prop_accounts WHERE status = 'active' ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

/// Get accounts of every status, newest first.
pub async fn get_all_accounts(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<Account>> {
    let accounts = sqlx::query_as::<_, Account>(
        "SELECT * FROM prop_accounts ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(accounts)
}

pub async fn get_account(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM prop_accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(account)
}

/// Apply a cycle patch to an active account. Returns false when the row is
/// gone or no longer active (failed or passed since it was read).
///
/// `highest_equity` only ever moves up, even if an older cycle commits late.
pub async fn apply_patch(
    conn: &mut PgConnection,
    id: Uuid,
    patch: &AccountPatch,
) -> anyhow::Result<bool> {
    let (clear_recovery_started, recovery_started) = match patch.recovery_mode_started_at {
        Some(Some(ts)) => (false, Some(ts)),
        Some(None) => (true, None),
        None => (false, None),
    };

    let result = sqlx::query(
        r#"
        UPDATE prop_accounts SET
            current_equity           = COALESCE($2, current_equity),
            unrealized_pnl           = COALESCE($3, unrealized_pnl),
            highest_equity           = GREATEST(highest_equity, COALESCE($4, highest_equity)),
            trailing_dd_floor        = COALESCE($5, trailing_dd_floor),
            daily_drawdown_used_pct  = COALESCE($6, daily_drawdown_used_pct),
            max_drawdown_used_pct    = COALESCE($7, max_drawdown_used_pct),
            status                   = COALESCE($8, status),
            failure_reason           = COALESCE($9, failure_reason),
            signals_paused           = COALESCE($10, signals_paused),
            recovery_mode_active     = COALESCE($11, recovery_mode_active),
            recovery_mode_started_at = CASE WHEN $12 THEN NULL
                                            ELSE COALESCE($13, recovery_mode_started_at) END,
            consecutive_winning_days = COALESCE($14, consecutive_winning_days),
            updated_at               = NOW()
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(id)
    .bind(patch.current_equity)
    .bind(patch.unrealized_pnl)
    .bind(patch.highest_equity)
    .bind(patch.trailing_dd_floor)
    .bind(patch.daily_drawdown_used_pct)
    .bind(patch.max_drawdown_used_pct)
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.failure_reason.as_deref())
    .bind(patch.signals_paused)
    .bind(patch.recovery_mode_active)
    .bind(clear_recovery_started)
    .bind(recovery_started)
    .bind(patch.consecutive_winning_days)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
