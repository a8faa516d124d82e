mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{FailingNotifier, InMemoryStore, RecordingNotifier};
use propguard::api::ws_types::WsMessage;
use propguard::models::{AlertKind, DrawdownScope};
use propguard::risk::drawdown::PERCENT_CEILING;
use propguard::services::monitor::MonitorError;
use propguard::services::notifier::NotificationSink;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 14, 30, 0).unwrap()
}

fn setup() -> (Arc<InMemoryStore>, Arc<RecordingNotifier>) {
    (Arc::new(InMemoryStore::new()), Arc::new(RecordingNotifier::default()))
}

fn sink(notifier: &Arc<RecordingNotifier>) -> Option<Arc<dyn NotificationSink>> {
    Some(notifier.clone())
}

#[tokio::test]
async fn test_daily_breach_fails_account() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    // 6% below the daily reference against a 5% limit
    store.set_unrealized(id, dec!(-600));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.accounts_failed, 1);
    assert_eq!(summary.alerts_sent, 1);
    assert_eq!(summary.accounts_at_risk, 0);

    let stored = store.account(id);
    assert_eq!(stored.status, "failed");
    assert!(stored.signals_paused);
    assert_eq!(stored.current_equity, dec!(9400));
    assert!(stored
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Daily drawdown limit breached"));

    // Breach takes precedence over every threshold
    let alerts = store.alerts_for(id);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Breach);
    assert_eq!(alerts[0].alert_date, now().date_naive());

    assert_eq!(notifier.titles(), vec!["Account failed: drawdown limit breached"]);
}

#[tokio::test]
async fn test_drawdown_exactly_at_limit_fails_account() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    // 5% below the daily reference against a 5% limit
    store.set_unrealized(id, dec!(-500));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.accounts_failed, 1);
    assert_eq!(store.account(id).status, "failed");
    let kinds: Vec<_> = store.alerts_for(id).iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AlertKind::Breach]);
}

#[tokio::test]
async fn test_degenerate_limit_does_not_stop_the_cycle() {
    let (store, notifier) = setup();
    let mut broken = common::account(10_000);
    broken.daily_dd_limit_pct = Decimal::new(1, 27);
    let healthy = common::account(10_000);
    let (broken_id, healthy_id) = (broken.id, healthy.id);
    store.add_account(broken);
    store.add_account(healthy);
    store.set_unrealized(broken_id, dec!(-600));
    store.set_unrealized(healthy_id, dec!(-100));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.accounts_failed, 1);

    // Usage saturates at the ceiling, which is still a breach
    let stored = store.account(broken_id);
    assert_eq!(stored.status, "failed");
    assert_eq!(stored.daily_drawdown_used_pct, PERCENT_CEILING);
    assert_eq!(store.account(healthy_id).current_equity, dec!(9900));
}

#[tokio::test]
async fn test_failed_account_is_not_evaluated_again() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-1200));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    monitor.run_cycle(now()).await.unwrap();
    let second = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(second.processed, 0);
    assert_eq!(store.alerts_for(id).len(), 1);
    assert_eq!(notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_threshold_alerts_sent_once_per_day() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    // 3.6% of a 5% daily limit = 72% used
    store.set_unrealized(id, dec!(-360));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let first = monitor.run_cycle(now()).await.unwrap();
    assert_eq!(first.alerts_sent, 2);
    assert_eq!(first.accounts_at_risk, 1);
    assert_eq!(first.recovery_mode_activated, 1);

    let kinds: Vec<_> = store.alerts_for(id).iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AlertKind::Threshold { scope: DrawdownScope::Daily, level: 50 },
            AlertKind::Threshold { scope: DrawdownScope::Daily, level: 70 },
        ]
    );

    let second = monitor.run_cycle(now() + chrono::Duration::minutes(5)).await.unwrap();
    assert_eq!(second.processed, 1);
    assert_eq!(second.alerts_sent, 0);
    assert_eq!(second.recovery_mode_activated, 0);
    assert_eq!(store.alerts_for(id).len(), 2);

    // Two threshold alerts plus the recovery activation, nothing from the rerun
    assert_eq!(
        notifier.titles(),
        vec![
            "Daily drawdown at 50% of limit",
            "Daily drawdown at 70% of limit",
            "Recovery mode activated",
        ]
    );
}

#[tokio::test]
async fn test_thresholds_rearm_on_a_new_day() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-300));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    monitor.run_cycle(now()).await.unwrap();
    let next_day = monitor.run_cycle(now() + chrono::Duration::days(1)).await.unwrap();

    assert_eq!(next_day.alerts_sent, 1);
    assert_eq!(store.alerts_for(id).len(), 2);
}

#[tokio::test]
async fn test_ninety_percent_pauses_signals() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    // 4.5% of 5% = 90% used
    store.set_unrealized(id, dec!(-450));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();
    assert_eq!(summary.alerts_sent, 3);
    assert_eq!(summary.accounts_failed, 0);

    let stored = store.account(id);
    assert_eq!(stored.status, "active");
    assert!(stored.signals_paused);
    assert_eq!(stored.daily_drawdown_used_pct, dec!(90));

    let alerts = store.alerts_for(id);
    let paused: Vec<_> = alerts.iter().filter(|a| a.signals_paused).collect();
    assert_eq!(paused.len(), 1);
    assert_eq!(
        paused[0].kind,
        AlertKind::Threshold { scope: DrawdownScope::Daily, level: 90 }
    );
}

#[tokio::test]
async fn test_recovery_activation_is_not_repeated() {
    let (store, notifier) = setup();
    let mut account = common::account(10_000);
    account.consecutive_winning_days = 2;
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-400));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    monitor.run_cycle(now()).await.unwrap();

    let stored = store.account(id);
    assert!(stored.recovery_mode_active);
    assert_eq!(stored.recovery_mode_started_at, Some(now()));
    assert_eq!(stored.consecutive_winning_days, 0);

    // The trade-closing collaborator records a winning day between cycles
    store.update_account(id, |a| a.consecutive_winning_days = 1);

    let later = now() + chrono::Duration::minutes(5);
    let summary = monitor.run_cycle(later).await.unwrap();
    assert_eq!(summary.recovery_mode_activated, 0);

    let stored = store.account(id);
    assert_eq!(stored.consecutive_winning_days, 1);
    assert_eq!(stored.recovery_mode_started_at, Some(now()));
}

#[tokio::test]
async fn test_recovery_completes_after_winning_streak() {
    let (store, notifier) = setup();
    let mut account = common::account(10_000);
    account.recovery_mode_active = true;
    account.recovery_mode_started_at = Some(now() - chrono::Duration::days(4));
    account.consecutive_winning_days = 3;
    let id = account.id;
    store.add_account(account);

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();
    assert_eq!(summary.recovery_mode_exited, 1);
    assert_eq!(summary.alerts_sent, 0);

    let stored = store.account(id);
    assert!(!stored.recovery_mode_active);
    assert_eq!(stored.recovery_mode_started_at, None);
    assert_eq!(notifier.titles(), vec!["Recovery mode completed"]);
}

#[tokio::test]
async fn test_breach_while_recovering_forces_exit() {
    let (store, notifier) = setup();
    let mut account = common::account(10_000);
    account.recovery_mode_active = true;
    account.recovery_mode_started_at = Some(now() - chrono::Duration::days(1));
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-1100));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();
    assert_eq!(summary.accounts_failed, 1);
    assert_eq!(summary.recovery_mode_exited, 1);

    let stored = store.account(id);
    assert_eq!(stored.status, "failed");
    assert!(!stored.recovery_mode_active);
    assert_eq!(stored.recovery_mode_started_at, None);
    // Only the breach notification
    assert_eq!(notifier.titles(), vec!["Account failed: drawdown limit breached"]);
}

#[tokio::test]
async fn test_trailing_high_water_mark_never_decreases() {
    let (store, notifier) = setup();
    let mut account = common::account(10_000);
    account.is_trailing_dd = true;
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(500));

    let monitor = common::monitor(store.clone(), sink(&notifier));
    monitor.run_cycle(now()).await.unwrap();
    assert_eq!(store.account(id).highest_equity, dec!(10500));

    store.set_unrealized(id, dec!(100));
    monitor.run_cycle(now() + chrono::Duration::minutes(5)).await.unwrap();

    let stored = store.account(id);
    assert_eq!(stored.current_equity, dec!(10100));
    assert_eq!(stored.highest_equity, dec!(10500));
    assert_eq!(stored.trailing_dd_floor, Some(dec!(9450)));
    // (10500 - 10100) / 10000 = 4% of a 10% limit
    assert_eq!(stored.max_drawdown_used_pct, dec!(40));
    assert!(notifier.titles().is_empty());
}

#[tokio::test]
async fn test_notification_failure_does_not_block_persistence() {
    let store = Arc::new(InMemoryStore::new());
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-600));

    let monitor = common::monitor(store.clone(), Some(Arc::new(FailingNotifier)));
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.alerts_sent, 1);
    assert_eq!(store.account(id).status, "failed");
    assert_eq!(store.alerts_for(id).len(), 1);
}

#[tokio::test]
async fn test_store_failure_skips_only_that_account() {
    let (store, notifier) = setup();
    let broken = common::account(10_000);
    let healthy = common::account(10_000);
    let unwritable = common::account(10_000);
    let (broken_id, healthy_id, unwritable_id) = (broken.id, healthy.id, unwritable.id);
    for a in [broken, healthy, unwritable] {
        store.add_account(a);
    }
    for id in [broken_id, healthy_id, unwritable_id] {
        store.set_unrealized(id, dec!(-300));
    }
    store.fail_positions_for(broken_id);
    store.fail_persist_for(unwritable_id);

    let monitor = common::monitor(store.clone(), sink(&notifier));
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.accounts_skipped, 2);
    assert_eq!(store.account(healthy_id).current_equity, dec!(9700));
    assert_eq!(store.account(broken_id).current_equity, dec!(10000));
    assert_eq!(store.account(unwritable_id).current_equity, dec!(10000));

    // Nothing is announced for an account whose update was not committed
    let sent = notifier.sent.lock().unwrap();
    assert!(sent.iter().all(|n| n.account_id == healthy_id));
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn test_concurrent_cycle_is_rejected() {
    let store = Arc::new(InMemoryStore::with_fetch_delay(Duration::from_millis(50)));
    store.add_account(common::account(10_000));
    let monitor = common::monitor(store, None);

    let (a, b) = tokio::join!(monitor.run_cycle(now()), monitor.run_cycle(now()));
    assert!(a.is_ok());
    assert!(matches!(b, Err(MonitorError::AlreadyRunning)));

    // The guard is released once the first cycle finishes
    assert!(!monitor.is_running());
    assert!(monitor.run_cycle(now()).await.is_ok());
}

#[tokio::test]
async fn test_concurrency_setting_processes_every_account() {
    let (store, notifier) = setup();
    let mut ids = Vec::new();
    for _ in 0..5 {
        let account = common::account(10_000);
        ids.push(account.id);
        store.add_account(account);
    }

    let config = propguard::services::monitor::MonitorConfig {
        concurrency: 2,
        ..Default::default()
    };
    let monitor = propguard::services::monitor::RiskMonitor::new(store.clone(), sink(&notifier), config);
    let summary = monitor.run_cycle(now()).await.unwrap();

    assert_eq!(summary.processed, 5);
    for id in ids {
        assert_eq!(store.account(id).current_equity, dec!(10000));
    }
}

#[tokio::test]
async fn test_events_and_last_summary() {
    let (store, notifier) = setup();
    let account = common::account(10_000);
    let id = account.id;
    store.add_account(account);
    store.set_unrealized(id, dec!(-260));

    let (tx, mut rx) = tokio::sync::broadcast::channel::<WsMessage>(16);
    let monitor = common::monitor(store.clone(), sink(&notifier)).with_events(tx);
    assert!(monitor.last_summary().await.is_none());

    let summary = monitor.run_cycle(now()).await.unwrap();
    assert_eq!(monitor.last_summary().await, Some(summary.clone()));

    match rx.try_recv().unwrap() {
        WsMessage::RiskAlert(alert) => {
            assert_eq!(alert.account_id, id);
            assert_eq!(alert.alert_type, "daily_dd_50");
        }
        other => panic!("expected a risk alert, got {other:?}"),
    }
    match rx.try_recv().unwrap() {
        WsMessage::CycleSummary(s) => assert_eq!(s, summary),
        other => panic!("expected a cycle summary, got {other:?}"),
    }

    let stored = store.account(id);
    assert_eq!(stored.daily_drawdown_used_pct, dec!(52));
    assert_eq!(stored.unrealized_pnl, dec!(-260));
    assert!(stored.max_drawdown_used_pct > Decimal::ZERO);
}
