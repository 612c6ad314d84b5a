use async_trait::async_trait;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::types::{
    Amount, BillingModel, BillingSummary, ChargeLine, ModelName, TaskType, UsageRecord, UserId,
};
use crate::error::{BillingError, Result};
use crate::storage::pool::StoreConnection;

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Commit one billable call: N immutable usage rows plus one additive
    /// summary upsert, in a single transaction. `total_calls` advances by
    /// the number of lines, so a two-line chat completion counts as 2.
    async fn record_charges(
        &self,
        user_id: &UserId,
        lines: &[ChargeLine],
        endpoint: &str,
        metadata: &serde_json::Value,
    ) -> Result<()>;

    async fn get_summary(&self, user_id: &UserId) -> Result<Option<BillingSummary>>;

    async fn recent_records(&self, user_id: &UserId, limit: i64) -> Result<Vec<UsageRecord>>;
}

pub struct SqlLedgerRepository {
    connection: Arc<StoreConnection>,
}

impl SqlLedgerRepository {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl LedgerRepository for SqlLedgerRepository {
    async fn record_charges(
        &self,
        user_id: &UserId,
        lines: &[ChargeLine],
        endpoint: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .connection
            .pool()
            .begin()
            .await
            .map_err(|e| BillingError::database("record_charges", e))?;

        let mut total_quantity: i64 = 0;
        let mut total_cost = Amount::zero();

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO billing.usage_records
                    (id, user_id, task_type, model_name, quantity, unit_price,
                     cost, billing_model, endpoint, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id.as_str())
            .bind(line.task_type.as_str())
            .bind(line.model.as_str())
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.cost.as_decimal())
            .bind(line.billing_model.as_str())
            .bind(endpoint)
            .bind(metadata)
            .execute(&mut *tx)
            .await
            .map_err(|e| BillingError::database("insert_usage_record", e))?;

            total_quantity += line.quantity;
            total_cost = total_cost.add(line.cost);
        }

        sqlx::query(
            r#"
            INSERT INTO billing.billing_summary
                (user_id, total_calls, total_quantity, total_cost, last_call_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                total_calls = billing_summary.total_calls + EXCLUDED.total_calls,
                total_quantity = billing_summary.total_quantity + EXCLUDED.total_quantity,
                total_cost = billing_summary.total_cost + EXCLUDED.total_cost,
                last_call_at = EXCLUDED.last_call_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(lines.len() as i64)
        .bind(total_quantity)
        .bind(total_cost.as_decimal())
        .execute(&mut *tx)
        .await
        .map_err(|e| BillingError::database("upsert_billing_summary", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("record_charges", e))?;

        Ok(())
    }

    async fn get_summary(&self, user_id: &UserId) -> Result<Option<BillingSummary>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, total_calls, total_quantity, total_cost, last_call_at
            FROM billing.billing_summary
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("get_summary", e))?;

        Ok(row.map(|r| BillingSummary {
            user_id: UserId::new(r.get::<String, _>("user_id")),
            total_calls: r.get("total_calls"),
            total_quantity: r.get("total_quantity"),
            total_cost: Amount::from_decimal(r.get("total_cost")),
            last_call_at: r.get("last_call_at"),
        }))
    }

    async fn recent_records(&self, user_id: &UserId, limit: i64) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, task_type, model_name, quantity, unit_price,
                   cost, billing_model, endpoint, metadata, created_at
            FROM billing.usage_records
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit)
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("recent_records", e))?;

        Ok(rows
            .into_iter()
            .map(|r| UsageRecord {
                id: r.get("id"),
                user_id: UserId::new(r.get::<String, _>("user_id")),
                task_type: TaskType::new(r.get::<String, _>("task_type")),
                model: ModelName::new(r.get::<String, _>("model_name")),
                quantity: r.get("quantity"),
                unit_price: r.get("unit_price"),
                cost: Amount::from_decimal(r.get("cost")),
                billing_model: BillingModel::from_str(r.get("billing_model"))
                    .unwrap_or(BillingModel::PerTenKChars),
                endpoint: r.get("endpoint"),
                metadata: r
                    .get::<Option<serde_json::Value>, _>("metadata")
                    .unwrap_or(serde_json::Value::Null),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}
