use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the prop_accounts table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub firm_name: Option<String>,
    pub starting_balance: Decimal,
    pub current_equity: Decimal,
    pub highest_equity: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    /// Equity snapshot taken at the start of the trading day. Zero or NULL means
    /// no reference has been taken yet.
    pub daily_starting_equity: Option<Decimal>,
    pub daily_dd_limit_pct: Decimal,
    pub max_dd_limit_pct: Decimal,
    pub is_trailing_dd: bool,
    pub trailing_dd_floor: Option<Decimal>,
    pub daily_drawdown_used_pct: Decimal,
    pub max_drawdown_used_pct: Decimal,
    pub status: String,
    pub failure_reason: Option<String>,
    pub signals_paused: bool,
    pub recovery_mode_active: bool,
    pub recovery_mode_started_at: Option<DateTime<Utc>>,
    pub consecutive_winning_days: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Account lifecycle. `Failed` is terminal; `Passed` is set outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Failed,
    Passed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Failed => "failed",
            AccountStatus::Passed => "passed",
        }
    }
}

/// Partial update produced by one monitoring cycle. `None` leaves the column untouched.
///
/// `recovery_mode_started_at` is doubly optional: `Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountPatch {
    pub current_equity: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub highest_equity: Option<Decimal>,
    pub trailing_dd_floor: Option<Decimal>,
    pub daily_drawdown_used_pct: Option<Decimal>,
    pub max_drawdown_used_pct: Option<Decimal>,
    pub status: Option<AccountStatus>,
    pub failure_reason: Option<String>,
    pub signals_paused: Option<bool>,
    pub recovery_mode_active: Option<bool>,
    pub recovery_mode_started_at: Option<Option<DateTime<Utc>>>,
    pub consecutive_winning_days: Option<i32>,
}

impl AccountPatch {
    /// Apply the patch to an in-memory copy of the account.
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(v) = self.current_equity {
            account.current_equity = v;
        }
        if let Some(v) = self.unrealized_pnl {
            account.unrealized_pnl = v;
        }
        if let Some(v) = self.highest_equity {
            account.highest_equity = v;
        }
        if let Some(v) = self.trailing_dd_floor {
            account.trailing_dd_floor = Some(v);
        }
        if let Some(v) = self.daily_drawdown_used_pct {
            account.daily_drawdown_used_pct = v;
        }
        if let Some(v) = self.max_drawdown_used_pct {
            account.max_drawdown_used_pct = v;
        }
        if let Some(v) = self.status {
            account.status = v.as_str().to_string();
        }
        if let Some(v) = &self.failure_reason {
            account.failure_reason = Some(v.clone());
        }
        if let Some(v) = self.signals_paused {
            account.signals_paused = v;
        }
        if let Some(v) = self.recovery_mode_active {
            account.recovery_mode_active = v;
        }
        if let Some(v) = self.recovery_mode_started_at {
            account.recovery_mode_started_at = v;
        }
        if let Some(v) = self.consecutive_winning_days {
            account.consecutive_winning_days = v;
        }
    }
}
