use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;

use crate::models::Notification;
use crate::risk::alerts::{Breach, ThresholdCrossing};
use crate::risk::recovery::RecoveryPolicy;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Propguard-Signature";

/// Delivery channel for user notifications. Callers treat failures as
/// best-effort: log and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Posts notifications as JSON to a webhook (push/email relay).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            secret,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let body = serde_json::to_vec(notification)?;

        let mut request = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let resp = request.body(body).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("notification webhook returned {}", resp.status());
        }

        tracing::debug!(
            account_id = %notification.account_id,
            title = %notification.title,
            "Notification delivered"
        );
        Ok(())
    }
}

/// HMAC-SHA256 of the raw body, base64-encoded.
pub fn sign_payload(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("HMAC key rejected: {e}"))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Threshold crossing, e.g. "Daily drawdown at 72% of limit".
pub fn format_threshold_alert(crossing: &ThresholdCrossing) -> (String, String) {
    let title = format!(
        "{} at {}% of limit",
        crossing.scope.label(),
        crossing.level
    );
    let mut body = format!(
        "{} is {:.2}%, which is {:.1}% of your {}% limit.",
        crossing.scope.label(),
        crossing.dd_pct,
        crossing.used_pct,
        crossing.limit_pct.normalize(),
    );
    if crossing.pauses_signals() {
        body.push_str(" New signals are paused for this account.");
    }
    (title, body)
}

pub fn format_breach(breach: &Breach) -> (String, String) {
    (
        "Account failed: drawdown limit breached".to_string(),
        format!("{}. The account has been closed.", breach.reason),
    )
}

pub fn format_recovery_activated(used_pct: Decimal, policy: &RecoveryPolicy) -> (String, String) {
    (
        "Recovery mode activated".to_string(),
        format!(
            "Drawdown reached {:.1}% of your limit. Risk per trade is reduced to {}% until you log {} consecutive winning days.",
            used_pct,
            policy.reduced_risk_pct.normalize(),
            policy.exit_winning_days,
        ),
    )
}

pub fn format_recovery_completed(winning_days: i32, policy: &RecoveryPolicy) -> (String, String) {
    (
        "Recovery mode completed".to_string(),
        format!(
            "{} consecutive winning days recorded (needed {}). Normal risk per trade is restored.",
            winning_days, policy.exit_winning_days,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertKind, DrawdownScope};
    use rust_decimal_macros::dec;

    #[test]
    fn signature_is_base64_sha256() {
        let sig = sign_payload("webhook-secret", b"{\"title\":\"x\"}").unwrap();
        assert!(BASE64.decode(&sig).is_ok());
        assert_eq!(sig.len(), 44);
        assert_eq!(sig, sign_payload("webhook-secret", b"{\"title\":\"x\"}").unwrap());
        assert_ne!(sig, sign_payload("other-secret", b"{\"title\":\"x\"}").unwrap());
    }

    #[test]
    fn threshold_message_names_percentage_and_limit() {
        let crossing = ThresholdCrossing {
            kind: AlertKind::Threshold { scope: DrawdownScope::Daily, level: 90 },
            scope: DrawdownScope::Daily,
            level: 90,
            dd_pct: dec!(4.6),
            limit_pct: dec!(5.00),
            used_pct: dec!(92),
        };
        let (title, body) = format_threshold_alert(&crossing);
        assert_eq!(title, "Daily drawdown at 90% of limit");
        assert!(body.contains("4.60%"));
        assert!(body.contains("92.0%"));
        assert!(body.contains("5% limit"));
        assert!(body.contains("signals are paused"));
    }

    #[test]
    fn recovery_message_names_reduced_risk() {
        let (_, body) = format_recovery_activated(dec!(80), &RecoveryPolicy::default());
        assert!(body.contains("0.5%"));
        assert!(body.contains("3 consecutive winning days"));
    }
}
