use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Account, AlertKind, DrawdownScope};

use super::drawdown::{DrawdownSnapshot, LimitUsage};

/// Severity levels, in percent of a limit.
pub const THRESHOLD_LEVELS: [u8; 3] = [50, 70, 90];

/// Crossing this level pauses new signals for the account.
pub const PAUSE_SIGNALS_LEVEL: u8 = 90;

/// A drawdown at or past its limit. Terminal for the account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breach {
    /// Scopes at or past 100% of their limit, daily first.
    pub scopes: Vec<DrawdownScope>,
    pub reason: String,
    /// The largest drawdown percentage among the breached scopes.
    pub dd_pct: Decimal,
    pub used_pct: Decimal,
}

/// A threshold crossed this cycle that has not been alerted yet today.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCrossing {
    pub kind: AlertKind,
    pub scope: DrawdownScope,
    pub level: u8,
    pub dd_pct: Decimal,
    pub limit_pct: Decimal,
    pub used_pct: Decimal,
}

impl ThresholdCrossing {
    pub fn pauses_signals(&self) -> bool {
        self.level >= PAUSE_SIGNALS_LEVEL
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AlertDecision {
    Breach(Breach),
    Thresholds {
        /// Only crossings missing from today's alert history.
        crossings: Vec<ThresholdCrossing>,
        /// True whenever either usage sits at or above the pause level,
        /// even if its alert went out earlier today.
        signals_paused: bool,
    },
}

impl AlertDecision {
    pub fn is_breach(&self) -> bool {
        matches!(self, AlertDecision::Breach(_))
    }
}

/// Decide breach or threshold alerts for one account.
///
/// `sent_today` holds the alert kinds already recorded for this account
/// today; crossings found there are dropped so each threshold fires
/// at most once per day.
pub fn evaluate(
    account: &Account,
    snapshot: &DrawdownSnapshot,
    usage: &LimitUsage,
    sent_today: &HashSet<AlertKind>,
) -> AlertDecision {
    let scopes = [
        (
            DrawdownScope::Daily,
            snapshot.daily_dd_pct,
            account.daily_dd_limit_pct,
            usage.daily_used_pct,
        ),
        (
            DrawdownScope::Max,
            snapshot.max_dd_pct,
            account.max_dd_limit_pct,
            usage.max_used_pct,
        ),
    ];

    let breached: Vec<_> = scopes
        .iter()
        .filter(|(_, _, _, used)| *used >= Decimal::ONE_HUNDRED)
        .collect();

    if !breached.is_empty() {
        let reason = breached
            .iter()
            .map(|(scope, dd, limit, _)| {
                format!(
                    "{} limit breached: {:.2}% against a {}% limit",
                    scope.label(),
                    dd,
                    limit.normalize()
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        let dd_pct = breached.iter().map(|(_, dd, _, _)| *dd).fold(Decimal::ZERO, Decimal::max);
        return AlertDecision::Breach(Breach {
            scopes: breached.iter().map(|(scope, _, _, _)| *scope).collect(),
            reason,
            dd_pct,
            used_pct: usage.worst(),
        });
    }

    let mut crossings = Vec::new();
    for &(scope, dd_pct, limit_pct, used_pct) in &scopes {
        for level in THRESHOLD_LEVELS {
            if used_pct < Decimal::from(level) {
                continue;
            }
            let kind = AlertKind::Threshold { scope, level };
            if sent_today.contains(&kind) {
                continue;
            }
            crossings.push(ThresholdCrossing {
                kind,
                scope,
                level,
                dd_pct,
                limit_pct,
                used_pct,
            });
        }
    }

    AlertDecision::Thresholds {
        crossings,
        signals_paused: usage.worst() >= Decimal::from(PAUSE_SIGNALS_LEVEL),
    }
}
