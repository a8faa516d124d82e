use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Database row for the prop_alerts table. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub alert_type: String,
    pub threshold_pct: Decimal,
    pub current_dd_pct: Decimal,
    pub equity_at_alert: Decimal,
    pub signals_paused: bool,
    pub alert_date: NaiveDate,
    pub created_at: Option<DateTime<Utc>>,
}

/// Which limit a drawdown figure is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawdownScope {
    Daily,
    Max,
}

impl DrawdownScope {
    pub fn label(&self) -> &'static str {
        match self {
            DrawdownScope::Daily => "Daily drawdown",
            DrawdownScope::Max => "Maximum drawdown",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            DrawdownScope::Daily => "daily_dd",
            DrawdownScope::Max => "max_dd",
        }
    }
}

/// Identifier stored in `prop_alerts.alert_type`, e.g. `max_dd_70` or `breach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    Threshold { scope: DrawdownScope, level: u8 },
    Breach,
}

impl AlertKind {
    pub fn alert_type(&self) -> String {
        match self {
            AlertKind::Threshold { scope, level } => format!("{}_{}", scope.prefix(), level),
            AlertKind::Breach => "breach".to_string(),
        }
    }

    pub fn from_alert_type(s: &str) -> Option<Self> {
        if s == "breach" {
            return Some(AlertKind::Breach);
        }
        let (scope, level) = if let Some(rest) = s.strip_prefix("daily_dd_") {
            (DrawdownScope::Daily, rest)
        } else if let Some(rest) = s.strip_prefix("max_dd_") {
            (DrawdownScope::Max, rest)
        } else {
            return None;
        };
        level
            .parse()
            .ok()
            .map(|level| AlertKind::Threshold { scope, level })
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alert_type())
    }
}

/// Alert row to insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlert {
    pub account_id: Uuid,
    pub kind: AlertKind,
    pub threshold_pct: Decimal,
    pub current_dd_pct: Decimal,
    pub equity_at_alert: Decimal,
    pub signals_paused: bool,
    pub alert_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_type_strings_parse_back() {
        let kinds = [
            AlertKind::Threshold { scope: DrawdownScope::Daily, level: 50 },
            AlertKind::Threshold { scope: DrawdownScope::Max, level: 90 },
            AlertKind::Breach,
        ];
        for kind in kinds {
            assert_eq!(AlertKind::from_alert_type(&kind.alert_type()), Some(kind));
        }
        assert_eq!(
            AlertKind::Threshold { scope: DrawdownScope::Max, level: 70 }.alert_type(),
            "max_dd_70"
        );
    }

    #[test]
    fn unknown_alert_type_is_rejected() {
        assert_eq!(AlertKind::from_alert_type("weekly_dd_50"), None);
        assert_eq!(AlertKind::from_alert_type("daily_dd_x"), None);
    }
}
