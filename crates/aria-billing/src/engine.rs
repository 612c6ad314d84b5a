//! Engine facade: pricing resolution, cost computation, and transactional
//! recording behind a single injected-dependency entry point.
//!
//! Billing is a side effect of serving a request, never a precondition:
//! every operation here returns an outcome value and swallows storage
//! failures after logging them, because the upstream action has already
//! happened and cannot be undone.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::EngineSettings;
use crate::domain::calculator;
use crate::domain::text;
use crate::domain::types::{
    Amount, BillingModel, ChargeLine, ModelName, ResourceKind, TaskType, Usage, UserId,
};
use crate::domain::video::VideoAttributes;
use crate::error::Result;
use crate::storage::{
    DeferredFeeRepository, FirstUseCharge, LedgerRepository, PricingRepository,
};

/// How a billing attempt concluded. Callers branch on this instead of
/// inspecting error types; `cost` is zero for everything but a successful
/// charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    /// Cost computed and committed.
    Charged,
    /// No pricing rule matched; a zero-cost record was still written.
    PricingGap,
    /// Deferred fee was collected by an earlier or concurrent call.
    AlreadyCharged,
    /// Resource was never registered and carries no fee.
    NotBillable,
    /// The store rejected the transaction; nothing was committed.
    StorageFailure,
}

/// Non-negative cost plus the explicit outcome kind. Returned for logging
/// only; it never carries an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeOutcome {
    pub cost: Amount,
    pub status: ChargeStatus,
}

impl ChargeOutcome {
    fn charged(cost: Amount) -> Self {
        Self {
            cost,
            status: ChargeStatus::Charged,
        }
    }

    fn zero(status: ChargeStatus) -> Self {
        Self {
            cost: Amount::zero(),
            status,
        }
    }

    pub fn is_charged(&self) -> bool {
        self.status == ChargeStatus::Charged
    }
}

/// Usage metering and billing engine.
///
/// Holds no mutable state of its own; all cross-call coordination is
/// delegated to the backing store's transactions. One instance is shared
/// by every concurrent request handler.
pub struct MeteringEngine {
    catalog: Arc<dyn PricingRepository>,
    ledger: Arc<dyn LedgerRepository>,
    deferred: Arc<dyn DeferredFeeRepository>,
    settings: EngineSettings,
}

impl MeteringEngine {
    pub fn new(
        catalog: Arc<dyn PricingRepository>,
        ledger: Arc<dyn LedgerRepository>,
        deferred: Arc<dyn DeferredFeeRepository>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            catalog,
            ledger,
            deferred,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Approximate a token count from text, using the configured
    /// chars-per-token ratio.
    pub fn estimate_tokens(&self, text: &str) -> u64 {
        text::estimate_tokens_for_text(text, self.settings.chars_per_token)
    }

    /// Record one completed unit of upstream work and return its cost.
    ///
    /// Token usage produces two charge lines (input and output, with the
    /// tier key in the task type); everything else produces one. All lines
    /// of a call commit in a single transaction together with the summary
    /// update.
    pub async fn record(
        &self,
        user_id: &UserId,
        task_type: &TaskType,
        model: &ModelName,
        usage: &Usage,
        endpoint: &str,
        metadata: serde_json::Value,
    ) -> ChargeOutcome {
        let (lines, status) = match usage {
            Usage::Tokens { input, output } => {
                (self.token_lines(task_type, model, *input, *output), ChargeStatus::Charged)
            }
            Usage::Video(attrs) => match self.video_line(task_type, model, attrs).await {
                Ok(line) => (vec![line], ChargeStatus::Charged),
                Err(e) => {
                    error!(user = %user_id, task = %task_type, error = %e, "pricing lookup failed");
                    return ChargeOutcome::zero(ChargeStatus::StorageFailure);
                }
            },
            _ => match self.catalog.resolve(task_type, model).await {
                Ok(Some(rule)) => {
                    let cost =
                        calculator::compute(rule.billing_model, rule.unit_price, usage.quantity());
                    let line = ChargeLine {
                        task_type: task_type.clone(),
                        model: model.clone(),
                        quantity: usage.quantity() as i64,
                        unit_price: rule.unit_price,
                        cost,
                        billing_model: rule.billing_model,
                    };
                    (vec![line], ChargeStatus::Charged)
                }
                Ok(None) => {
                    warn!(
                        user = %user_id,
                        task = %task_type,
                        model = %model,
                        "no pricing rule matched, recording zero cost"
                    );
                    let line = ChargeLine {
                        task_type: task_type.clone(),
                        model: model.clone(),
                        quantity: usage.quantity() as i64,
                        unit_price: rust_decimal::Decimal::ZERO,
                        cost: Amount::zero(),
                        billing_model: usage.default_billing_model(),
                    };
                    (vec![line], ChargeStatus::PricingGap)
                }
                Err(e) => {
                    error!(user = %user_id, task = %task_type, error = %e, "pricing lookup failed");
                    return ChargeOutcome::zero(ChargeStatus::StorageFailure);
                }
            },
        };

        let total = lines
            .iter()
            .fold(Amount::zero(), |acc, line| acc.add(line.cost));

        match self
            .ledger
            .record_charges(user_id, &lines, endpoint, &metadata)
            .await
        {
            Ok(()) => {
                info!(
                    user = %user_id,
                    task = %task_type,
                    model = %model,
                    cost = %total,
                    lines = lines.len(),
                    "recorded charge"
                );
                ChargeOutcome {
                    cost: total,
                    status,
                }
            }
            Err(e) => {
                error!(user = %user_id, task = %task_type, error = %e, "failed to record charge");
                ChargeOutcome::zero(ChargeStatus::StorageFailure)
            }
        }
    }

    /// Register a generated resource whose fee is billed on first use, not
    /// at creation. Idempotent per (user, resource).
    pub async fn register_resource(
        &self,
        user_id: &UserId,
        resource_id: &str,
        kind: &ResourceKind,
    ) -> Result<()> {
        let fee = match self
            .catalog
            .resolve(&kind.fee_task_type(), &ModelName::wildcard())
            .await?
        {
            Some(rule) => Amount::from_decimal(rule.unit_price),
            None => {
                warn!(kind = %kind, "no catalog fee for resource kind, using default");
                Amount::from_decimal(self.settings.default_resource_fee)
            }
        };

        self.deferred
            .register(user_id, resource_id, kind, fee)
            .await?;

        info!(user = %user_id, resource = resource_id, kind = %kind, fee = %fee, "registered deferred fee");
        Ok(())
    }

    /// Charge the one-time resource fee if this is its first use. A
    /// nonzero cost signals "first use"; concurrent callers on the same
    /// resource race on the store's conditional update, and losers get 0.
    pub async fn charge_if_first_use(
        &self,
        user_id: &UserId,
        resource_id: &str,
        endpoint: &str,
    ) -> ChargeOutcome {
        match self
            .deferred
            .charge_if_first_use(user_id, resource_id, endpoint)
            .await
        {
            Ok(FirstUseCharge::Charged { fee, kind }) => {
                info!(
                    user = %user_id,
                    resource = resource_id,
                    kind = %kind,
                    fee = %fee,
                    "charged first-use resource fee"
                );
                ChargeOutcome::charged(fee)
            }
            Ok(FirstUseCharge::AlreadyCharged) => ChargeOutcome::zero(ChargeStatus::AlreadyCharged),
            Ok(FirstUseCharge::NotRegistered) => ChargeOutcome::zero(ChargeStatus::NotBillable),
            Err(e) => {
                error!(user = %user_id, resource = resource_id, error = %e, "deferred fee check failed");
                ChargeOutcome::zero(ChargeStatus::StorageFailure)
            }
        }
    }

    /// Bill usage that only became known once an asynchronous job
    /// completed. The submission was already recorded at zero; this issues
    /// the follow-up charge under the same task type, tagging the job id
    /// for audit. The engine does not deduplicate retries of the same job:
    /// callers own exactly-once delivery of the completion event.
    pub async fn reconcile(
        &self,
        user_id: &UserId,
        task_type: &TaskType,
        model: &ModelName,
        usage: &Usage,
        endpoint: &str,
        job_id: &str,
        metadata: serde_json::Value,
    ) -> ChargeOutcome {
        let metadata = match metadata {
            serde_json::Value::Object(mut map) => {
                map.insert(
                    "reconciliation_job_id".to_string(),
                    serde_json::Value::String(job_id.to_string()),
                );
                serde_json::Value::Object(map)
            }
            other => serde_json::json!({
                "reconciliation_job_id": job_id,
                "metadata": other,
            }),
        };

        self.record(user_id, task_type, model, usage, endpoint, metadata)
            .await
    }

    fn token_lines(
        &self,
        task_type: &TaskType,
        model: &ModelName,
        input: u64,
        output: u64,
    ) -> Vec<ChargeLine> {
        let tier = self.settings.token_tiers.select(model, input);

        let (input_task, output_task) = match &tier.label {
            Some(label) => (
                task_type.suffixed(&format!("input_{label}")),
                task_type.suffixed(&format!("output_{label}")),
            ),
            None => (task_type.suffixed("input"), task_type.suffixed("output")),
        };

        vec![
            ChargeLine {
                task_type: input_task,
                model: model.clone(),
                quantity: input as i64,
                unit_price: tier.input_price,
                cost: calculator::token_cost(input, tier.input_price),
                billing_model: BillingModel::PerMillionTokens,
            },
            ChargeLine {
                task_type: output_task,
                model: model.clone(),
                quantity: output as i64,
                unit_price: tier.output_price,
                cost: calculator::token_cost(output, tier.output_price),
                billing_model: BillingModel::PerMillionTokens,
            },
        ]
    }

    async fn video_line(
        &self,
        task_type: &TaskType,
        model: &ModelName,
        attrs: &VideoAttributes,
    ) -> Result<ChargeLine> {
        let row = self.settings.video_tiers.resolve(model, attrs);
        let tier_task = task_type.suffixed(&row.tier);

        // Catalog rows for the resolved tier take precedence over the
        // built-in table, so operators can reprice through the store.
        let unit_price = match self.catalog.resolve(&tier_task, model).await? {
            Some(rule) => rule.unit_price,
            None => row.price,
        };

        Ok(ChargeLine {
            task_type: tier_task,
            model: model.clone(),
            quantity: 1,
            unit_price,
            cost: calculator::compute(BillingModel::PerVideo, unit_price, 1),
            billing_model: BillingModel::PerVideo,
        })
    }
}
