use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts for one monitoring cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub processed: u32,
    pub alerts_sent: u32,
    pub accounts_failed: u32,
    pub accounts_at_risk: u32,
    pub recovery_mode_activated: u32,
    pub recovery_mode_exited: u32,
    /// Accounts left untouched because a store call failed; retried next cycle.
    pub accounts_skipped: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
