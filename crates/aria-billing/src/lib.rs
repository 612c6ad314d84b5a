pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod storage;

pub use config::BillingConfig;
pub use engine::{ChargeOutcome, ChargeStatus, MeteringEngine};
pub use error::{BillingError, Result};
