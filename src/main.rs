use std::sync::Arc;

use tokio::sync::broadcast;

use propguard::api::router::create_router;
use propguard::api::ws_types::WsMessage;
use propguard::config::{AppConfig, LogFormat};
use propguard::db::{self, PgRiskStore};
use propguard::services::monitor::{run_monitor_loop, RiskMonitor};
use propguard::services::notifier::{NotificationSink, WebhookNotifier};
use propguard::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    let metrics_handle = propguard::metrics::init_metrics();
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let db = db::init_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connected, migrations applied");

    // --- Notifications ---
    let notifier: Option<Arc<dyn NotificationSink>> = match (&config.notify_webhook_url, config.notifications_enabled) {
        (Some(url), true) => {
            tracing::info!(signed = config.notify_webhook_secret.is_some(), "Webhook notifications enabled");
            Some(Arc::new(WebhookNotifier::new(
                url.clone(),
                config.notify_webhook_secret.clone(),
            )))
        }
        (None, true) => {
            tracing::warn!("NOTIFY_WEBHOOK_URL is not set; alerts are recorded but not delivered");
            None
        }
        (_, false) => {
            tracing::info!("Notifications disabled (NOTIFICATIONS_ENABLED=false)");
            None
        }
    };

    // --- Monitoring cycle ---
    let (ws_tx, _) = broadcast::channel::<WsMessage>(256);
    let store = Arc::new(PgRiskStore::new(db.clone()));
    let monitor = Arc::new(
        RiskMonitor::new(store, notifier, config.monitor_config()).with_events(ws_tx.clone()),
    );

    if config.monitor_interval_secs > 0 {
        tracing::info!(
            interval_secs = config.monitor_interval_secs,
            concurrency = config.monitor_concurrency,
            "Starting in-process monitor loop"
        );
        let loop_monitor = Arc::clone(&monitor);
        let interval_secs = config.monitor_interval_secs;
        tokio::spawn(async move {
            run_monitor_loop(loop_monitor, interval_secs).await;
        });
    } else {
        tracing::info!("MONITOR_INTERVAL_SECS=0; cycles run only via POST /api/monitor/run");
    }

    let state = AppState {
        db,
        config,
        ws_tx,
        metrics_handle,
        monitor,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
