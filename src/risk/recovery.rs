use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::models::{Account, AccountPatch};

/// Recovery-mode thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Limit usage (percent of the tighter limit) that switches recovery on.
    pub entry_used_pct: Decimal,
    /// Consecutive winning days required to switch it off.
    pub exit_winning_days: i32,
    /// Risk per trade advertised while recovering.
    pub reduced_risk_pct: Decimal,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            entry_used_pct: dec!(70),
            exit_winning_days: 3,
            reduced_risk_pct: dec!(0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Normal,
    Recovering,
}

impl RecoveryState {
    pub fn of(account: &Account) -> Self {
        if account.recovery_mode_active {
            RecoveryState::Recovering
        } else {
            RecoveryState::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryTransition {
    /// Normal → Recovering after a deep drawdown.
    Activated,
    /// Recovering → Normal after a winning streak.
    Completed,
    /// Recovering → Normal because the account failed this cycle.
    ForcedExit,
}

/// Decide the recovery transition for this cycle, if any.
///
/// Guards on the current state, so re-running with unchanged inputs after
/// the patch has been applied yields `None`.
pub fn decide(
    account: &Account,
    worst_used_pct: Decimal,
    failed_this_cycle: bool,
    policy: &RecoveryPolicy,
) -> Option<RecoveryTransition> {
    match RecoveryState::of(account) {
        RecoveryState::Recovering if failed_this_cycle => Some(RecoveryTransition::ForcedExit),
        RecoveryState::Recovering if account.consecutive_winning_days >= policy.exit_winning_days => {
            Some(RecoveryTransition::Completed)
        }
        RecoveryState::Recovering => None,
        RecoveryState::Normal if failed_this_cycle => None,
        RecoveryState::Normal if worst_used_pct >= policy.entry_used_pct => {
            Some(RecoveryTransition::Activated)
        }
        RecoveryState::Normal => None,
    }
}

/// Write the transition's state changes into the cycle patch.
pub fn apply(transition: RecoveryTransition, now: DateTime<Utc>, patch: &mut AccountPatch) {
    match transition {
        RecoveryTransition::Activated => {
            patch.recovery_mode_active = Some(true);
            patch.recovery_mode_started_at = Some(Some(now));
            patch.consecutive_winning_days = Some(0);
        }
        RecoveryTransition::Completed | RecoveryTransition::ForcedExit => {
            patch.recovery_mode_active = Some(false);
            patch.recovery_mode_started_at = Some(None);
        }
    }
}
