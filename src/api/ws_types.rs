use serde::Serialize;
use uuid::Uuid;

use crate::models::{CycleSummary, NewAlert};

/// Messages broadcast to all connected WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "cycle_summary")]
    CycleSummary(CycleSummary),

    #[serde(rename = "risk_alert")]
    RiskAlert(RiskAlertData),
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAlertData {
    pub account_id: Uuid,
    pub alert_type: String,
    pub threshold_pct: String,
    pub current_dd_pct: String,
    pub equity_at_alert: String,
    pub signals_paused: bool,
}

impl From<&NewAlert> for RiskAlertData {
    fn from(alert: &NewAlert) -> Self {
        Self {
            account_id: alert.account_id,
            alert_type: alert.kind.alert_type(),
            threshold_pct: alert.threshold_pct.to_string(),
            current_dd_pct: alert.current_dd_pct.to_string(),
            equity_at_alert: alert.equity_at_alert.to_string(),
            signals_paused: alert.signals_paused,
        }
    }
}
