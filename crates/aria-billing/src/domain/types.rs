use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::video::VideoAttributes;

/// Opaque authenticated user identifier, issued by the identity verifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task type identifier, e.g. `sync_tts`, `async_tts`, `text_chat`,
/// `video_generation`, `voice_design`, `voice_clone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn sync_tts() -> Self {
        Self("sync_tts".to_string())
    }

    pub fn async_tts() -> Self {
        Self("async_tts".to_string())
    }

    pub fn text_chat() -> Self {
        Self("text_chat".to_string())
    }

    pub fn video_generation() -> Self {
        Self("video_generation".to_string())
    }

    /// Derived task type with a tier or role suffix, e.g.
    /// `text_chat_input_0_32k` or `video_generation_768p_10s`.
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(format!("{}_{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream model name. `all_models` is the wildcard sentinel used by the
/// pricing catalog fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelName(String);

pub const WILDCARD_MODEL: &str = "all_models";

impl ModelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn wildcard() -> Self {
        Self(WILDCARD_MODEL.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_MODEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount with precision handling.
///
/// Rounded to 4 decimal places, matching the DECIMAL(10,4) ledger columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Amount(Decimal);

impl Amount {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn from_decimal(amount: Decimal) -> Self {
        Self(amount.round_dp(4))
    }

    pub fn from_f64(amount: f64) -> Option<Self> {
        Decimal::from_f64(amount).map(|d| Self(d.round_dp(4)))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn add(&self, other: Amount) -> Self {
        Self::from_decimal(self.0 + other.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pricing formula family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingModel {
    /// Price quoted per 10,000 weighted characters.
    PerTenKChars,
    /// Fixed fee per generated resource (e.g. a synthesized voice).
    PerResource,
    /// Fixed price selected from the video tier table.
    PerVideo,
    /// Price quoted per 1,000,000 tokens, tiered by input context size.
    PerMillionTokens,
}

impl BillingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingModel::PerTenKChars => "per_10k_chars",
            BillingModel::PerResource => "per_resource",
            BillingModel::PerVideo => "per_video",
            BillingModel::PerMillionTokens => "per_million_tokens",
        }
    }
}

impl fmt::Display for BillingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillingModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per_10k_chars" => Ok(BillingModel::PerTenKChars),
            "per_resource" => Ok(BillingModel::PerResource),
            "per_video" => Ok(BillingModel::PerVideo),
            "per_million_tokens" => Ok(BillingModel::PerMillionTokens),
            other => Err(format!("unknown billing model '{other}'")),
        }
    }
}

/// Kind of generated resource tracked for deferred first-use billing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKind(String);

impl ResourceKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn voice_design() -> Self {
        Self("voice_design".to_string())
    }

    pub fn voice_clone() -> Self {
        Self("voice_clone".to_string())
    }

    /// Task type under which the first-use fee is recorded.
    pub fn charge_task_type(&self) -> TaskType {
        TaskType::new(format!("{}_charge", self.0))
    }

    /// Task type whose catalog rule carries the resource fee.
    pub fn fee_task_type(&self) -> TaskType {
        TaskType::new(self.0.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw usage facts for one unit of upstream work.
#[derive(Debug, Clone, PartialEq)]
pub enum Usage {
    /// Weighted character count (wide scripts count double).
    Characters { weighted: u64 },
    /// Approximate input/output token counts for a chat completion.
    Tokens { input: u64, output: u64 },
    /// Number of generated resources.
    Resources { count: u64 },
    /// Attributes of a video generation request, already probed from the
    /// raw request body.
    Video(VideoAttributes),
}

impl Usage {
    /// Quantity recorded against the aggregate summary.
    pub fn quantity(&self) -> u64 {
        match self {
            Usage::Characters { weighted } => *weighted,
            Usage::Tokens { input, output } => input + output,
            Usage::Resources { count } => *count,
            Usage::Video(_) => 1,
        }
    }

    /// Billing model recorded when no pricing rule matched.
    pub fn default_billing_model(&self) -> BillingModel {
        match self {
            Usage::Characters { .. } => BillingModel::PerTenKChars,
            Usage::Tokens { .. } => BillingModel::PerMillionTokens,
            Usage::Resources { .. } => BillingModel::PerResource,
            Usage::Video(_) => BillingModel::PerVideo,
        }
    }
}

/// One logical sub-charge produced by a single engine call.
///
/// Most operations produce one line; a chat completion produces two
/// (input and output tokens), committed in the same transaction.
#[derive(Debug, Clone)]
pub struct ChargeLine {
    pub task_type: TaskType,
    pub model: ModelName,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub cost: Amount,
    pub billing_model: BillingModel,
}

/// Immutable ledger row.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub task_type: TaskType,
    pub model: ModelName,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub cost: Amount,
    pub billing_model: BillingModel,
    pub endpoint: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Per-user aggregate, maintained additively with every committed charge.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingSummary {
    pub user_id: UserId,
    pub total_calls: i64,
    pub total_quantity: i64,
    pub total_cost: Amount,
    pub last_call_at: Option<DateTime<Utc>>,
}

/// Deferred first-use fee state for one generated resource.
#[derive(Debug, Clone)]
pub struct DeferredFeeRecord {
    pub user_id: UserId,
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub fee: Amount,
    pub is_charged: bool,
    pub created_at: DateTime<Utc>,
    pub first_used_at: Option<DateTime<Utc>>,
    pub charged_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_rounds_to_four_places() {
        let amount = Amount::from_decimal(dec!(1.23456));
        assert_eq!(amount.as_decimal(), dec!(1.2346));

        let sum = amount.add(Amount::from_decimal(dec!(0.0004)));
        assert_eq!(sum.as_decimal(), dec!(1.2350));
    }

    #[test]
    fn test_billing_model_round_trip() {
        for model in [
            BillingModel::PerTenKChars,
            BillingModel::PerResource,
            BillingModel::PerVideo,
            BillingModel::PerMillionTokens,
        ] {
            assert_eq!(model.as_str().parse::<BillingModel>().unwrap(), model);
        }
        assert!("per_hour".parse::<BillingModel>().is_err());
    }

    #[test]
    fn test_wildcard_model() {
        assert!(ModelName::wildcard().is_wildcard());
        assert!(!ModelName::new("speech-02-hd").is_wildcard());
    }

    #[test]
    fn test_task_type_suffix() {
        let task = TaskType::text_chat().suffixed("input_0_32k");
        assert_eq!(task.as_str(), "text_chat_input_0_32k");
    }

    #[test]
    fn test_usage_quantity() {
        assert_eq!(Usage::Characters { weighted: 5000 }.quantity(), 5000);
        assert_eq!(
            Usage::Tokens {
                input: 100,
                output: 50
            }
            .quantity(),
            150
        );
        assert_eq!(Usage::Video(VideoAttributes::default()).quantity(), 1);
    }
}
