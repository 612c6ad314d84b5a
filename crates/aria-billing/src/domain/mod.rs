pub mod calculator;
pub mod pricing;
pub mod text;
pub mod tokens;
pub mod types;
pub mod video;

pub use pricing::PricingRule;
pub use types::{
    Amount, BillingModel, BillingSummary, ChargeLine, DeferredFeeRecord, ModelName, ResourceKind,
    TaskType, Usage, UsageRecord, UserId,
};
pub use video::{VideoAttributes, VideoProbeConfig, VideoTierTable};
