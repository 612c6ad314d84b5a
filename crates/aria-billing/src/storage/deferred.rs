use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::types::{Amount, DeferredFeeRecord, ResourceKind, UserId};
use crate::error::{BillingError, Result};
use crate::storage::pool::StoreConnection;

/// Outcome of a first-use check for a registered resource.
#[derive(Debug, Clone, PartialEq)]
pub enum FirstUseCharge {
    /// This caller won the false->true transition and the fee was billed.
    Charged { fee: Amount, kind: ResourceKind },
    /// The fee was already collected by an earlier (or concurrent) call.
    AlreadyCharged,
    /// No record exists; the resource was never registered (e.g. a
    /// provider-preset voice) and is not billable.
    NotRegistered,
}

#[async_trait]
pub trait DeferredFeeRepository: Send + Sync {
    /// Insert or refresh a pending fee record. Idempotent: re-registering
    /// before first use updates metadata only and never resets a fee that
    /// was already charged.
    async fn register(
        &self,
        user_id: &UserId,
        resource_id: &str,
        kind: &ResourceKind,
        fee: Amount,
    ) -> Result<()>;

    /// Atomically charge the fee if this is the resource's first use. The
    /// false->true flip, the ledger insert, and the summary upsert commit
    /// in one transaction; concurrent callers race on a conditional UPDATE
    /// so exactly one of them observes `Charged`.
    async fn charge_if_first_use(
        &self,
        user_id: &UserId,
        resource_id: &str,
        endpoint: &str,
    ) -> Result<FirstUseCharge>;

    async fn get(&self, user_id: &UserId, resource_id: &str)
        -> Result<Option<DeferredFeeRecord>>;
}

pub struct SqlDeferredFeeRepository {
    connection: Arc<StoreConnection>,
}

impl SqlDeferredFeeRepository {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl DeferredFeeRepository for SqlDeferredFeeRepository {
    async fn register(
        &self,
        user_id: &UserId,
        resource_id: &str,
        kind: &ResourceKind,
        fee: Amount,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO billing.deferred_fees
                (user_id, resource_id, resource_kind, fee, is_charged)
            VALUES ($1, $2, $3, $4, FALSE)
            ON CONFLICT (user_id, resource_id) DO UPDATE SET
                resource_kind = EXCLUDED.resource_kind,
                created_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(resource_id)
        .bind(kind.as_str())
        .bind(fee.as_decimal())
        .execute(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("register_deferred_fee", e))?;

        Ok(())
    }

    async fn charge_if_first_use(
        &self,
        user_id: &UserId,
        resource_id: &str,
        endpoint: &str,
    ) -> Result<FirstUseCharge> {
        let mut tx = self
            .connection
            .pool()
            .begin()
            .await
            .map_err(|e| BillingError::database("charge_if_first_use", e))?;

        // Conditional UPDATE: only one concurrent transaction can move
        // is_charged from FALSE to TRUE for this (user, resource) row.
        let won = sqlx::query(
            r#"
            UPDATE billing.deferred_fees
            SET is_charged = TRUE, first_used_at = NOW(), charged_at = NOW()
            WHERE user_id = $1 AND resource_id = $2 AND is_charged = FALSE
            RETURNING fee, resource_kind
            "#,
        )
        .bind(user_id.as_str())
        .bind(resource_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BillingError::database("flip_deferred_fee", e))?;

        let Some(row) = won else {
            let exists: Option<i64> = sqlx::query_scalar(
                "SELECT 1 FROM billing.deferred_fees WHERE user_id = $1 AND resource_id = $2",
            )
            .bind(user_id.as_str())
            .bind(resource_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| BillingError::database("check_deferred_fee", e))?;

            tx.commit()
                .await
                .map_err(|e| BillingError::database("charge_if_first_use", e))?;

            return Ok(if exists.is_some() {
                FirstUseCharge::AlreadyCharged
            } else {
                FirstUseCharge::NotRegistered
            });
        };

        let fee = Amount::from_decimal(row.get("fee"));
        let kind = ResourceKind::new(row.get::<String, _>("resource_kind"));

        sqlx::query(
            r#"
            INSERT INTO billing.usage_records
                (id, user_id, task_type, model_name, quantity, unit_price,
                 cost, billing_model, endpoint, metadata)
            VALUES ($1, $2, $3, 'all_models', 0, $4, $4, 'per_resource', $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_str())
        .bind(kind.charge_task_type().as_str())
        .bind(fee.as_decimal())
        .bind(endpoint)
        .bind(serde_json::json!({ "resource_id": resource_id, "first_use": true }))
        .execute(&mut *tx)
        .await
        .map_err(|e| BillingError::database("insert_fee_record", e))?;

        sqlx::query(
            r#"
            INSERT INTO billing.billing_summary
                (user_id, total_calls, total_quantity, total_cost, last_call_at)
            VALUES ($1, 1, 0, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                total_calls = billing_summary.total_calls + 1,
                total_cost = billing_summary.total_cost + EXCLUDED.total_cost,
                last_call_at = EXCLUDED.last_call_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(fee.as_decimal())
        .execute(&mut *tx)
        .await
        .map_err(|e| BillingError::database("upsert_billing_summary", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("charge_if_first_use", e))?;

        Ok(FirstUseCharge::Charged { fee, kind })
    }

    async fn get(
        &self,
        user_id: &UserId,
        resource_id: &str,
    ) -> Result<Option<DeferredFeeRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, resource_id, resource_kind, fee, is_charged,
                   created_at, first_used_at, charged_at
            FROM billing.deferred_fees
            WHERE user_id = $1 AND resource_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(resource_id)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("get_deferred_fee", e))?;

        Ok(row.map(|r| DeferredFeeRecord {
            user_id: UserId::new(r.get::<String, _>("user_id")),
            resource_id: r.get("resource_id"),
            resource_kind: ResourceKind::new(r.get::<String, _>("resource_kind")),
            fee: Amount::from_decimal(r.get("fee")),
            is_charged: r.get("is_charged"),
            created_at: r.get("created_at"),
            first_used_at: r.get("first_used_at"),
            charged_at: r.get("charged_at"),
        }))
    }
}
