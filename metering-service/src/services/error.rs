use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Domain errors for the metering services layer.
#[derive(Error, Debug)]
pub enum MeteringError {
    #[error("Unrecognized operation type: {0}")]
    UnrecognizedOperationType(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    #[error("Account not found: {0}")]
    UnknownAccount(Uuid),

    #[error("Configuration integrity: {0}")]
    ConfigurationGap(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<MeteringError> for AppError {
    fn from(err: MeteringError) -> Self {
        match err {
            MeteringError::UnrecognizedOperationType(key) => {
                AppError::BadRequest(anyhow::anyhow!("Unrecognized operation type: {}", key))
            }
            MeteringError::InsufficientCredits {
                required,
                available,
            } => AppError::PaymentRequired {
                code: "insufficient_credits",
                message: format!(
                    "Insufficient credits: required {}, available {}",
                    required, available
                ),
            },
            MeteringError::InvalidAmount(amount) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid amount: {}", amount))
            }
            MeteringError::UnknownPlan(key) => {
                AppError::BadRequest(anyhow::anyhow!("Unknown plan: {}", key))
            }
            MeteringError::UnknownAccount(id) => {
                AppError::NotFound(anyhow::anyhow!("Account not found: {}", id))
            }
            MeteringError::ConfigurationGap(detail) => {
                AppError::InternalError(anyhow::anyhow!("Configuration integrity: {}", detail))
            }
            MeteringError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}
