use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register the risk engine metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first cycle.
    counter!("monitor_cycles_total").absolute(0);
    counter!("accounts_processed_total").absolute(0);
    counter!("risk_alerts_sent").absolute(0);
    counter!("accounts_failed_total").absolute(0);
    counter!("recovery_mode_activated_total").absolute(0);
    counter!("recovery_mode_exited_total").absolute(0);
    counter!("notifications_failed_total").absolute(0);

    gauge!("accounts_at_risk").set(0.0);

    histogram!("monitor_cycle_seconds").record(0.0);

    handle
}
