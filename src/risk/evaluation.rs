use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::models::{
    Account, AccountPatch, AccountStatus, AlertKind, NewAlert, Notification, OpenPosition,
};
use crate::services::notifier;

use super::alerts::{self, AlertDecision};
use super::drawdown::{self, DrawdownSnapshot, LimitUsage};
use super::recovery::{self, RecoveryPolicy, RecoveryTransition};

/// Per-cycle inputs shared by every account.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub policy: &'a RecoveryPolicy,
    pub dashboard_base_url: &'a str,
}

/// Alert row plus the notification to send once the row is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub alert: NewAlert,
    pub notification: Notification,
}

/// Everything one cycle decided for one account. Nothing here has touched
/// the store yet.
#[derive(Debug, Clone)]
pub struct AccountEvaluation {
    pub account_id: uuid::Uuid,
    pub snapshot: DrawdownSnapshot,
    pub usage: LimitUsage,
    pub patch: AccountPatch,
    pub alerts: Vec<PendingAlert>,
    /// Recovery-mode notifications; not tied to an alert row.
    pub notifications: Vec<Notification>,
    pub failed: bool,
    pub at_risk: bool,
    pub recovery: Option<RecoveryTransition>,
}

/// compute → decide → patch for one account.
///
/// Order matters: equity and drawdown feed the breach/threshold decision,
/// whose outcome feeds the recovery transition.
pub fn evaluate_account(
    account: &Account,
    positions: &[OpenPosition],
    sent_today: &HashSet<AlertKind>,
    ctx: &EvaluationContext<'_>,
) -> AccountEvaluation {
    let mut snapshot = drawdown::compute(account, positions);
    let usage = drawdown::limit_usage(account, &mut snapshot);
    let url = account_url(ctx.dashboard_base_url, account);

    let mut patch = AccountPatch {
        current_equity: Some(snapshot.current_equity),
        unrealized_pnl: Some(snapshot.unrealized_pnl),
        highest_equity: Some(snapshot.new_highest_equity),
        trailing_dd_floor: snapshot.trailing_dd_floor.map(|f| f.round_dp(2)),
        daily_drawdown_used_pct: Some(usage.daily_used_pct.round_dp(4)),
        max_drawdown_used_pct: Some(usage.max_used_pct.round_dp(4)),
        ..AccountPatch::default()
    };

    let mut pending = Vec::new();
    let decision = alerts::evaluate(account, &snapshot, &usage, sent_today);
    match &decision {
        AlertDecision::Breach(breach) => {
            patch.status = Some(AccountStatus::Failed);
            patch.failure_reason = Some(breach.reason.clone());
            patch.signals_paused = Some(true);

            let (title, body) = notifier::format_breach(breach);
            pending.push(PendingAlert {
                alert: NewAlert {
                    account_id: account.id,
                    kind: AlertKind::Breach,
                    threshold_pct: Decimal::ONE_HUNDRED,
                    current_dd_pct: breach.dd_pct.round_dp(4),
                    equity_at_alert: snapshot.current_equity,
                    signals_paused: true,
                    alert_date: ctx.today,
                },
                notification: notification(account, title, body, &url),
            });
        }
        AlertDecision::Thresholds {
            crossings,
            signals_paused,
        } => {
            if *signals_paused {
                patch.signals_paused = Some(true);
            }
            for crossing in crossings {
                let (title, body) = notifier::format_threshold_alert(crossing);
                pending.push(PendingAlert {
                    alert: NewAlert {
                        account_id: account.id,
                        kind: crossing.kind,
                        threshold_pct: Decimal::from(crossing.level),
                        current_dd_pct: crossing.dd_pct.round_dp(4),
                        equity_at_alert: snapshot.current_equity,
                        signals_paused: crossing.pauses_signals(),
                        alert_date: ctx.today,
                    },
                    notification: notification(account, title, body, &url),
                });
            }
        }
    }

    let failed = decision.is_breach();
    let worst = usage.worst();
    let mut notifications = Vec::new();
    let transition = recovery::decide(account, worst, failed, ctx.policy);
    if let Some(t) = transition {
        recovery::apply(t, ctx.now, &mut patch);
        let message = match t {
            RecoveryTransition::Activated => Some(notifier::format_recovery_activated(worst, ctx.policy)),
            RecoveryTransition::Completed => Some(notifier::format_recovery_completed(
                account.consecutive_winning_days,
                ctx.policy,
            )),
            // The breach notification already tells the owner the account is closed
            RecoveryTransition::ForcedExit => None,
        };
        if let Some((title, body)) = message {
            notifications.push(notification(account, title, body, &url));
        }
    }

    AccountEvaluation {
        account_id: account.id,
        at_risk: !failed && worst >= ctx.policy.entry_used_pct,
        snapshot,
        usage,
        patch,
        alerts: pending,
        notifications,
        failed,
        recovery: transition,
    }
}

fn account_url(base: &str, account: &Account) -> String {
    format!("{}/accounts/{}", base.trim_end_matches('/'), account.id)
}

fn notification(account: &Account, title: String, body: String, url: &str) -> Notification {
    Notification {
        account_id: account.id,
        user_id: account.user_id,
        title,
        body,
        url: url.to_string(),
    }
}
