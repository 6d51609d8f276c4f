use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by the rate table, ledger, posting and reporting services.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Unknown brand {0}")]
    UnknownBrand(Uuid),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::UnknownBrand(_) => "unknown_brand",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation { .. } | LedgerError::UnknownBrand(_) => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            LedgerError::NotFound(what) => AppError::NotFound(anyhow::anyhow!("{} not found", what)),
            LedgerError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            LedgerError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}
