use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound user notification. Delivery (push, email, webhook) belongs to a `NotificationSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub url: String,
}
