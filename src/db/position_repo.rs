use sqlx::PgPool;
use uuid::Uuid;

use crate::models::OpenPosition;

/// Open trade allocations for an account. A NULL PnL counts as flat.
pub async fn get_open_positions(pool: &PgPool, account_id: Uuid) -> anyhow::Result<Vec<OpenPosition>> {
    let positions = sqlx::query_as::<_, OpenPosition>(
        r#"
        SELECT account_id, COALESCE(unrealized_pnl, 0) AS unrealized_pnl
        FROM trade_allocations
        WHERE account_id = $1 AND status = 'open'
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(positions)
}
