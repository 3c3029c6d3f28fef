use chrono::{DateTime, Utc};
use sqlx::Row;

use coreflow_core::domain::bundle::BundleId;
use coreflow_core::domain::subscription::{Subscription, SubscriptionId};
use coreflow_core::domain::tenant::TenantId;

use super::{RepositoryError, SubscriptionRepository};
use crate::DbPool;

pub struct SqlSubscriptionRepository {
    pool: DbPool,
}

impl SqlSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_subscription(
    row: &sqlx::sqlite::SqliteRow,
    bundles: Vec<BundleId>,
) -> Result<Subscription, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let tier: String = row.try_get("tier").map_err(decode_err)?;
    let seats: i64 = row.try_get("seats").map_err(decode_err)?;
    let billing_cycle: String = row.try_get("billing_cycle").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let promo_code: Option<String> = row.try_get("promo_code").map_err(decode_err)?;
    let current_period_end: String = row.try_get("current_period_end").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(Subscription {
        id: SubscriptionId(id),
        tenant_id: TenantId(tenant_id),
        tier: tier.parse().map_err(decode_err)?,
        bundles,
        seats: u32::try_from(seats).map_err(decode_err)?,
        billing_cycle: billing_cycle.parse().map_err(decode_err)?,
        status: status.parse().map_err(decode_err)?,
        promo_code,
        current_period_end: parse_timestamp("current_period_end", &current_period_end)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl SubscriptionRepository for SqlSubscriptionRepository {
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, tier, seats, billing_cycle, status, promo_code,
                    current_period_end, created_at, updated_at
             FROM subscription WHERE tenant_id = ?",
        )
        .bind(&tenant_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let subscription_id: String = row.try_get("id").map_err(decode_err)?;
        let bundles: Vec<String> = sqlx::query_scalar(
            "SELECT bundle_id FROM subscription_bundle
             WHERE subscription_id = ? ORDER BY position ASC",
        )
        .bind(&subscription_id)
        .fetch_all(&self.pool)
        .await?;

        row_to_subscription(&row, bundles.into_iter().map(BundleId).collect()).map(Some)
    }

    async fn save(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO subscription (id, tenant_id, tier, seats, billing_cycle, status,
                                       promo_code, current_period_end, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id) DO UPDATE SET
                 tier = excluded.tier,
                 seats = excluded.seats,
                 billing_cycle = excluded.billing_cycle,
                 status = excluded.status,
                 promo_code = excluded.promo_code,
                 current_period_end = excluded.current_period_end,
                 updated_at = excluded.updated_at",
        )
        .bind(&subscription.id.0)
        .bind(&subscription.tenant_id.0)
        .bind(subscription.tier.as_str())
        .bind(i64::from(subscription.seats))
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.status.as_str())
        .bind(&subscription.promo_code)
        .bind(subscription.current_period_end.to_rfc3339())
        .bind(subscription.created_at.to_rfc3339())
        .bind(subscription.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // A tenant keeps its original subscription id across upserts.
        let stored_id: String = sqlx::query_scalar("SELECT id FROM subscription WHERE tenant_id = ?")
            .bind(&subscription.tenant_id.0)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM subscription_bundle WHERE subscription_id = ?")
            .bind(&stored_id)
            .execute(&mut *tx)
            .await?;

        for (position, bundle) in subscription.bundles.iter().enumerate() {
            sqlx::query(
                "INSERT INTO subscription_bundle (subscription_id, bundle_id, position)
                 VALUES (?, ?, ?)",
            )
            .bind(&stored_id)
            .bind(&bundle.0)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
