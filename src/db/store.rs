use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Account, AccountPatch, AlertKind, NewAlert, OpenPosition};

use super::{account_repo, alert_repo, position_repo};

/// Storage seam for the monitoring cycle.
#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn fetch_active_accounts(&self) -> anyhow::Result<Vec<Account>>;

    async fn fetch_open_positions(&self, account_id: Uuid) -> anyhow::Result<Vec<OpenPosition>>;

    /// Alert kinds already recorded for the account on `date`.
    async fn alert_kinds_on(&self, account_id: Uuid, date: NaiveDate) -> anyhow::Result<HashSet<AlertKind>>;

    /// Apply the patch and insert the alerts atomically. Returns the alert
    /// kinds actually inserted; kinds already present for that day are skipped.
    async fn persist(
        &self,
        account_id: Uuid,
        patch: &AccountPatch,
        alerts: &[NewAlert],
    ) -> anyhow::Result<Vec<AlertKind>>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgRiskStore {
    pool: PgPool,
}

impl PgRiskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskStore for PgRiskStore {
    async fn fetch_active_accounts(&self) -> anyhow::Result<Vec<Account>> {
        account_repo::get_active_accounts(&self.pool).await
    }

    async fn fetch_open_positions(&self, account_id: Uuid) -> anyhow::Result<Vec<OpenPosition>> {
        position_repo::get_open_positions(&self.pool, account_id).await
    }

    async fn alert_kinds_on(&self, account_id: Uuid, date: NaiveDate) -> anyhow::Result<HashSet<AlertKind>> {
        alert_repo::get_alert_kinds_on(&self.pool, account_id, date).await
    }

    async fn persist(
        &self,
        account_id: Uuid,
        patch: &AccountPatch,
        alerts: &[NewAlert],
    ) -> anyhow::Result<Vec<AlertKind>> {
        let mut tx = self.pool.begin().await?;

        if !account_repo::apply_patch(&mut *tx, account_id, patch).await? {
            // Dropping the transaction rolls it back
            anyhow::bail!("account {account_id} is no longer active");
        }

        let mut inserted = Vec::with_capacity(alerts.len());
        for alert in alerts {
            if alert_repo::insert_alert(&mut *tx, alert).await?.is_some() {
                inserted.push(alert.kind);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}
