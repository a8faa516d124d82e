use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::api::ws_types::{RiskAlertData, WsMessage};
use crate::db::RiskStore;
use crate::models::{Account, CycleSummary, Notification};
use crate::risk::evaluation::{self, EvaluationContext};
use crate::risk::recovery::{RecoveryPolicy, RecoveryTransition};
use crate::services::notifier::NotificationSink;

/// Settings for the monitoring cycle.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Accounts evaluated concurrently. 1 processes them sequentially.
    pub concurrency: usize,
    pub policy: RecoveryPolicy,
    pub dashboard_base_url: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            policy: RecoveryPolicy::default(),
            dashboard_base_url: "http://localhost:3000".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("a monitoring cycle is already in progress")]
    AlreadyRunning,

    #[error("failed to load active accounts: {0}")]
    FetchAccounts(#[source] anyhow::Error),
}

/// What happened to one account in a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AccountOutcome {
    /// A store call failed; the account is retried next cycle.
    Skipped,
    Processed {
        alerts_sent: u32,
        failed: bool,
        at_risk: bool,
        recovery: Option<RecoveryTransition>,
    },
}

/// Held for the duration of a cycle; released on drop, including when the
/// cycle future is cancelled.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Monitoring cycle orchestrator: evaluates every active account once per
/// invocation and persists one patch per account.
pub struct RiskMonitor {
    store: Arc<dyn RiskStore>,
    notifier: Option<Arc<dyn NotificationSink>>,
    events: Option<broadcast::Sender<WsMessage>>,
    config: MonitorConfig,
    running: AtomicBool,
    last_summary: RwLock<Option<CycleSummary>>,
}

impl RiskMonitor {
    pub fn new(
        store: Arc<dyn RiskStore>,
        notifier: Option<Arc<dyn NotificationSink>>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            events: None,
            config,
            running: AtomicBool::new(false),
            last_summary: RwLock::new(None),
        }
    }

    /// Publish cycle summaries and new alerts to dashboard WebSocket clients.
    pub fn with_events(mut self, tx: broadcast::Sender<WsMessage>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn last_summary(&self) -> Option<CycleSummary> {
        self.last_summary.read().await.clone()
    }

    /// Run one monitoring cycle. Per-account failures are logged and counted
    /// as skipped; only a failure to list accounts aborts the cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, MonitorError> {
        let _guard = CycleGuard::acquire(&self.running).ok_or(MonitorError::AlreadyRunning)?;
        let timer = Instant::now();

        let accounts = self
            .store
            .fetch_active_accounts()
            .await
            .map_err(MonitorError::FetchAccounts)?;

        tracing::info!(accounts = accounts.len(), "Monitoring cycle started");

        let ctx = EvaluationContext {
            now,
            today: now.date_naive(),
            policy: &self.config.policy,
            dashboard_base_url: &self.config.dashboard_base_url,
        };

        let mut outcomes = Vec::with_capacity(accounts.len());
        for batch in accounts.chunks(self.config.concurrency.max(1)) {
            let pending: Vec<_> = batch
                .iter()
                .map(|account| self.process_account(account, &ctx))
                .collect();
            outcomes.extend(join_all(pending).await);
        }

        let mut summary = CycleSummary {
            started_at: Some(now),
            ..CycleSummary::default()
        };
        for outcome in outcomes {
            match outcome {
                AccountOutcome::Skipped => summary.accounts_skipped += 1,
                AccountOutcome::Processed {
                    alerts_sent,
                    failed,
                    at_risk,
                    recovery,
                } => {
                    summary.processed += 1;
                    summary.alerts_sent += alerts_sent;
                    summary.accounts_failed += u32::from(failed);
                    summary.accounts_at_risk += u32::from(at_risk);
                    match recovery {
                        Some(RecoveryTransition::Activated) => summary.recovery_mode_activated += 1,
                        Some(RecoveryTransition::Completed | RecoveryTransition::ForcedExit) => {
                            summary.recovery_mode_exited += 1
                        }
                        None => {}
                    }
                }
            }
        }
        summary.finished_at = Some(Utc::now());

        counter!("monitor_cycles_total").increment(1);
        gauge!("accounts_at_risk").set(f64::from(summary.accounts_at_risk));
        histogram!("monitor_cycle_seconds").record(timer.elapsed().as_secs_f64());

        tracing::info!(
            processed = summary.processed,
            skipped = summary.accounts_skipped,
            alerts_sent = summary.alerts_sent,
            failed = summary.accounts_failed,
            at_risk = summary.accounts_at_risk,
            recovery_activated = summary.recovery_mode_activated,
            recovery_exited = summary.recovery_mode_exited,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Monitoring cycle complete"
        );

        *self.last_summary.write().await = Some(summary.clone());
        if let Some(tx) = &self.events {
            let _ = tx.send(WsMessage::CycleSummary(summary.clone()));
        }

        Ok(summary)
    }

    async fn process_account(&self, account: &Account, ctx: &EvaluationContext<'_>) -> AccountOutcome {
        let positions = match self.store.fetch_open_positions(account.id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account.id, "Failed to fetch open positions");
                return AccountOutcome::Skipped;
            }
        };

        let sent_today = match self.store.alert_kinds_on(account.id, ctx.today).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account.id, "Failed to load alert history");
                return AccountOutcome::Skipped;
            }
        };

        let eval = evaluation::evaluate_account(account, &positions, &sent_today, ctx);

        for anomaly in &eval.snapshot.anomalies {
            tracing::warn!(account_id = %account.id, anomaly = ?anomaly, "Drawdown reference anomaly");
        }

        tracing::debug!(
            account_id = %account.id,
            equity = %eval.snapshot.current_equity,
            daily_dd_pct = %eval.snapshot.daily_dd_pct,
            max_dd_pct = %eval.snapshot.max_dd_pct,
            daily_used_pct = %eval.usage.daily_used_pct,
            max_used_pct = %eval.usage.max_used_pct,
            "Account evaluated"
        );

        let new_alerts: Vec<_> = eval.alerts.iter().map(|p| p.alert.clone()).collect();
        let inserted = match self.store.persist(account.id, &eval.patch, &new_alerts).await {
            Ok(kinds) => kinds,
            Err(e) => {
                tracing::error!(error = %e, account_id = %account.id, "Failed to persist account update");
                return AccountOutcome::Skipped;
            }
        };

        counter!("accounts_processed_total").increment(1);
        if eval.failed {
            counter!("accounts_failed_total").increment(1);
            tracing::warn!(
                account_id = %account.id,
                reason = eval.patch.failure_reason.as_deref().unwrap_or_default(),
                "Account failed: drawdown limit breached"
            );
        }
        match eval.recovery {
            Some(RecoveryTransition::Activated) => {
                counter!("recovery_mode_activated_total").increment(1);
                tracing::info!(account_id = %account.id, "Recovery mode activated");
            }
            Some(t) => {
                counter!("recovery_mode_exited_total").increment(1);
                tracing::info!(account_id = %account.id, transition = ?t, "Recovery mode exited");
            }
            None => {}
        }

        // State is committed; everything below is best-effort.
        let mut alerts_sent = 0;
        for pending in eval.alerts.iter().filter(|p| inserted.contains(&p.alert.kind)) {
            alerts_sent += 1;
            counter!("risk_alerts_sent").increment(1);
            tracing::info!(account_id = %account.id, alert = %pending.alert.kind, "Risk alert recorded");
            if let Some(tx) = &self.events {
                let _ = tx.send(WsMessage::RiskAlert(RiskAlertData::from(&pending.alert)));
            }
            self.dispatch(&pending.notification).await;
        }
        for notification in &eval.notifications {
            self.dispatch(notification).await;
        }

        AccountOutcome::Processed {
            alerts_sent,
            failed: eval.failed,
            at_risk: eval.at_risk,
            recovery: eval.recovery,
        }
    }

    async fn dispatch(&self, notification: &Notification) {
        let Some(sink) = &self.notifier else {
            return;
        };
        if let Err(e) = sink.send(notification).await {
            counter!("notifications_failed_total").increment(1);
            tracing::warn!(
                error = %e,
                account_id = %notification.account_id,
                title = %notification.title,
                "Failed to send notification"
            );
        }
    }
}

/// Optional in-process trigger for deployments without an external scheduler.
pub async fn run_monitor_loop(monitor: Arc<RiskMonitor>, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match monitor.run_cycle(Utc::now()).await {
            Ok(_) => {}
            Err(MonitorError::AlreadyRunning) => {
                tracing::debug!("Monitoring cycle still in flight, skipping tick");
            }
            Err(e) => {
                tracing::error!(error = %e, "Monitoring cycle failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = CycleGuard::acquire(&flag).expect("first acquire");
        assert!(CycleGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(CycleGuard::acquire(&flag).is_some());
    }
}
