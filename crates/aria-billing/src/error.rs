use thiserror::Error;

/// Repository- and setup-level errors.
///
/// Billing operations on the engine facade never surface these to callers;
/// they are converted into explicit `ChargeStatus` values so the serving
/// path cannot be failed by metering.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("database operation '{operation}' failed: {source}")]
    DatabaseError {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    ConfigError(#[from] figment::Error),

    #[error("invalid {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl BillingError {
    pub fn database(operation: &str, source: sqlx::Error) -> Self {
        Self::DatabaseError {
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T, E = BillingError> = std::result::Result<T, E>;
