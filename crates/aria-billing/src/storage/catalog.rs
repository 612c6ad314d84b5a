use async_trait::async_trait;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::domain::pricing::{default_rules, PricingRule};
use crate::domain::types::{BillingModel, ModelName, TaskType};
use crate::error::{BillingError, Result};
use crate::storage::pool::StoreConnection;

#[async_trait]
pub trait PricingRepository: Send + Sync {
    /// Rule lookup with wildcard fallback: exact (task, model) first, then
    /// (task, `all_models`). `None` means a pricing gap, not an error.
    async fn resolve(&self, task_type: &TaskType, model: &ModelName)
        -> Result<Option<PricingRule>>;

    async fn upsert_rule(&self, rule: &PricingRule) -> Result<()>;

    async fn list_active(&self) -> Result<Vec<PricingRule>>;

    /// Seed the default catalog if the table is empty. Returns the number
    /// of rows inserted (0 when already seeded).
    async fn seed_defaults(&self) -> Result<u64>;
}

pub struct SqlPricingRepository {
    connection: Arc<StoreConnection>,
}

impl SqlPricingRepository {
    pub fn new(connection: Arc<StoreConnection>) -> Self {
        Self { connection }
    }

    fn rule_from_row(row: &sqlx::postgres::PgRow) -> PricingRule {
        PricingRule {
            task_type: TaskType::new(row.get::<String, _>("task_type")),
            model_name: ModelName::new(row.get::<String, _>("model_name")),
            unit_price: row.get("unit_price"),
            billing_model: BillingModel::from_str(row.get("billing_model"))
                .unwrap_or(BillingModel::PerTenKChars),
            active: row.get("is_active"),
            description: row.get::<Option<String>, _>("description").unwrap_or_default(),
        }
    }

    async fn fetch_exact(
        &self,
        task_type: &TaskType,
        model: &ModelName,
    ) -> Result<Option<PricingRule>> {
        let row = sqlx::query(
            r#"
            SELECT task_type, model_name, unit_price, billing_model, is_active, description
            FROM billing.pricing_rules
            WHERE task_type = $1 AND model_name = $2 AND is_active = TRUE
            "#,
        )
        .bind(task_type.as_str())
        .bind(model.as_str())
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("resolve_pricing", e))?;

        Ok(row.as_ref().map(Self::rule_from_row))
    }
}

#[async_trait]
impl PricingRepository for SqlPricingRepository {
    async fn resolve(
        &self,
        task_type: &TaskType,
        model: &ModelName,
    ) -> Result<Option<PricingRule>> {
        if let Some(rule) = self.fetch_exact(task_type, model).await? {
            return Ok(Some(rule));
        }
        if model.is_wildcard() {
            return Ok(None);
        }
        self.fetch_exact(task_type, &ModelName::wildcard()).await
    }

    async fn upsert_rule(&self, rule: &PricingRule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO billing.pricing_rules
                (task_type, model_name, unit_price, billing_model, description, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (task_type, model_name) DO UPDATE SET
                unit_price = EXCLUDED.unit_price,
                billing_model = EXCLUDED.billing_model,
                description = EXCLUDED.description,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(rule.task_type.as_str())
        .bind(rule.model_name.as_str())
        .bind(rule.unit_price)
        .bind(rule.billing_model.as_str())
        .bind(&rule.description)
        .bind(rule.active)
        .execute(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("upsert_rule", e))?;

        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<PricingRule>> {
        let rows = sqlx::query(
            r#"
            SELECT task_type, model_name, unit_price, billing_model, is_active, description
            FROM billing.pricing_rules
            WHERE is_active = TRUE
            ORDER BY task_type, model_name
            "#,
        )
        .fetch_all(self.connection.pool())
        .await
        .map_err(|e| BillingError::database("list_active_rules", e))?;

        Ok(rows.iter().map(Self::rule_from_row).collect())
    }

    async fn seed_defaults(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM billing.pricing_rules")
            .fetch_one(self.connection.pool())
            .await
            .map_err(|e| BillingError::database("count_pricing_rules", e))?;

        if count > 0 {
            return Ok(0);
        }

        let rules = default_rules();
        let mut tx = self
            .connection
            .pool()
            .begin()
            .await
            .map_err(|e| BillingError::database("seed_defaults", e))?;

        for rule in &rules {
            sqlx::query(
                r#"
                INSERT INTO billing.pricing_rules
                    (task_type, model_name, unit_price, billing_model, description, is_active)
                VALUES ($1, $2, $3, $4, $5, TRUE)
                ON CONFLICT (task_type, model_name) DO NOTHING
                "#,
            )
            .bind(rule.task_type.as_str())
            .bind(rule.model_name.as_str())
            .bind(rule.unit_price)
            .bind(rule.billing_model.as_str())
            .bind(&rule.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| BillingError::database("seed_defaults", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::database("seed_defaults", e))?;

        info!(rules = rules.len(), "seeded default pricing catalog");
        Ok(rules.len() as u64)
    }
}
