pub mod catalog;
pub mod deferred;
pub mod ledger;
pub mod pool;

pub use catalog::{PricingRepository, SqlPricingRepository};

pub use ledger::{LedgerRepository, SqlLedgerRepository};

pub use deferred::{DeferredFeeRepository, FirstUseCharge, SqlDeferredFeeRepository};

pub use pool::StoreConnection;
