use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;

use crate::risk::recovery::RecoveryPolicy;
use crate::services::monitor::MonitorConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Bearer token for the API and the scheduler trigger. Unset disables auth.
    pub api_token: Option<String>,
    pub log_format: LogFormat,

    // Monitoring cycle
    /// In-process trigger period; 0 leaves scheduling to an external caller.
    pub monitor_interval_secs: u64,
    pub monitor_concurrency: usize,
    pub recovery_entry_pct: Decimal,
    pub recovery_exit_winning_days: i32,
    pub recovery_risk_pct: Decimal,

    // Notifications
    pub notify_webhook_url: Option<String>,
    pub notify_webhook_secret: Option<String>,
    pub notifications_enabled: bool,
    pub dashboard_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            log_format: match env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },

            monitor_interval_secs: parse_or("MONITOR_INTERVAL_SECS", 300),
            monitor_concurrency: parse_or("MONITOR_CONCURRENCY", 1),
            recovery_entry_pct: parse_or("RECOVERY_ENTRY_PCT", dec!(70)),
            recovery_exit_winning_days: parse_or("RECOVERY_EXIT_WINNING_DAYS", 3),
            recovery_risk_pct: parse_or("RECOVERY_RISK_PCT", dec!(0.5)),

            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
            notify_webhook_secret: env::var("NOTIFY_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            notifications_enabled: parse_or("NOTIFICATIONS_ENABLED", true),
            dashboard_base_url: env::var("DASHBOARD_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            concurrency: self.monitor_concurrency.max(1),
            policy: RecoveryPolicy {
                entry_used_pct: self.recovery_entry_pct,
                exit_winning_days: self.recovery_exit_winning_days,
                reduced_risk_pct: self.recovery_risk_pct,
            },
            dashboard_base_url: self.dashboard_base_url.clone(),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
