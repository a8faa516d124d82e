use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::models::{Account, OpenPosition};

/// Reference data problems that degrade a figure to 0% instead of faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownAnomaly {
    /// No daily starting equity yet; daily drawdown reported as 0 this cycle.
    MissingDailyReference,
    /// Starting balance ≤ 0; max drawdown reported as 0, account needs review.
    NonPositiveStartingBalance,
    /// A drawdown limit ≤ 0; its usage is reported as 0.
    NonPositiveLimit,
    /// A percentage overflowed or exceeded [`PERCENT_CEILING`] and was clamped to it.
    PercentClamped,
}

/// Largest drawdown or usage percentage reported. Degenerate reference data
/// (a near-zero limit, a runaway loss) saturates here instead of overflowing.
pub const PERCENT_CEILING: Decimal = dec!(99999999);

fn note(anomalies: &mut Vec<DrawdownAnomaly>, anomaly: DrawdownAnomaly) {
    if !anomalies.contains(&anomaly) {
        anomalies.push(anomaly);
    }
}

fn clamp_percent(pct: Option<Decimal>, anomalies: &mut Vec<DrawdownAnomaly>) -> Decimal {
    match pct {
        Some(pct) if pct <= PERCENT_CEILING => pct,
        _ => {
            note(anomalies, DrawdownAnomaly::PercentClamped);
            PERCENT_CEILING
        }
    }
}

/// Equity and drawdown figures for one account at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownSnapshot {
    pub current_equity: Decimal,
    pub unrealized_pnl: Decimal,
    /// Percent of equity lost since the daily reference.
    pub daily_dd_pct: Decimal,
    /// Percent of starting balance lost from the static or trailing baseline.
    pub max_dd_pct: Decimal,
    pub new_highest_equity: Decimal,
    /// Equity level at which the trailing limit is hit; `None` for static accounts.
    pub trailing_dd_floor: Option<Decimal>,
    pub anomalies: Vec<DrawdownAnomaly>,
}

/// Drawdown expressed as a share of the account's limits (100 = limit reached).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LimitUsage {
    pub daily_used_pct: Decimal,
    pub max_used_pct: Decimal,
}

impl LimitUsage {
    pub fn worst(&self) -> Decimal {
        self.daily_used_pct.max(self.max_used_pct)
    }
}

/// Current equity = starting balance + realized PnL + open positions' unrealized PnL.
/// Sums saturate at the `Decimal` range.
pub fn compute_equity(account: &Account, positions: &[OpenPosition]) -> (Decimal, Decimal) {
    let unrealized = positions
        .iter()
        .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.unrealized_pnl));
    let equity = account
        .starting_balance
        .saturating_add(account.realized_pnl)
        .saturating_add(unrealized);
    (equity, unrealized)
}

/// Compute equity and daily/max drawdown. All percentages are clamped at 0.
pub fn compute(account: &Account, positions: &[OpenPosition]) -> DrawdownSnapshot {
    let (current_equity, unrealized_pnl) = compute_equity(account, positions);
    let mut anomalies = Vec::new();

    let daily_ref = match account.daily_starting_equity {
        Some(reference) if reference > Decimal::ZERO => reference,
        _ => {
            anomalies.push(DrawdownAnomaly::MissingDailyReference);
            current_equity
        }
    };
    let daily_dd_pct = clamp_percent(percent_below(daily_ref, current_equity, daily_ref), &mut anomalies);

    let new_highest_equity = account.highest_equity.max(current_equity);

    let max_dd_pct = if account.starting_balance <= Decimal::ZERO {
        anomalies.push(DrawdownAnomaly::NonPositiveStartingBalance);
        Decimal::ZERO
    } else {
        let reference = if account.is_trailing_dd {
            new_highest_equity
        } else {
            account.starting_balance
        };
        clamp_percent(
            percent_below(reference, current_equity, account.starting_balance),
            &mut anomalies,
        )
    };

    // Out-of-range limits leave the floor unset rather than storing nonsense
    let trailing_dd_floor = if account.is_trailing_dd {
        Decimal::ONE_HUNDRED
            .checked_sub(account.max_dd_limit_pct)
            .and_then(|kept| kept.checked_div(Decimal::ONE_HUNDRED))
            .and_then(|keep| new_highest_equity.checked_mul(keep))
    } else {
        None
    };

    DrawdownSnapshot {
        current_equity,
        unrealized_pnl,
        daily_dd_pct,
        max_dd_pct,
        new_highest_equity,
        trailing_dd_floor,
        anomalies,
    }
}

/// Convert drawdown percentages into percent-of-limit usage.
pub fn limit_usage(account: &Account, snapshot: &mut DrawdownSnapshot) -> LimitUsage {
    let daily_dd_pct = snapshot.daily_dd_pct;
    let max_dd_pct = snapshot.max_dd_pct;
    let mut used = |dd_pct: Decimal, limit: Decimal| {
        if limit <= Decimal::ZERO {
            note(&mut snapshot.anomalies, DrawdownAnomaly::NonPositiveLimit);
            return Decimal::ZERO;
        }
        let usage = dd_pct
            .checked_div(limit)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
        clamp_percent(usage, &mut snapshot.anomalies)
    };
    LimitUsage {
        daily_used_pct: used(daily_dd_pct, account.daily_dd_limit_pct),
        max_used_pct: used(max_dd_pct, account.max_dd_limit_pct),
    }
}

/// `(reference - current) / base * 100`, never negative, 0 when base ≤ 0.
/// `None` on overflow, which can only mean a drawdown too large to represent.
fn percent_below(reference: Decimal, current: Decimal, base: Decimal) -> Option<Decimal> {
    if base <= Decimal::ZERO || current >= reference {
        return Some(Decimal::ZERO);
    }
    reference
        .checked_sub(current)?
        .checked_div(base)?
        .checked_mul(Decimal::ONE_HUNDRED)
}
