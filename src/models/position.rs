use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Open trade allocation on a prop account. Only the unrealized PnL matters for equity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpenPosition {
    pub account_id: Uuid,
    pub unrealized_pnl: Decimal,
}
