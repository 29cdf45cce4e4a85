use devboostly_catalog::{CatalogError, PricingError};
use devboostly_core::GatewayError;
use crate::models::TransitionError;
use crate::repository::RepositoryError;

/// Errors surfaced by the order services to the API layer
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// The request is well-formed but clashes with the current state.
    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Money was captured but the local records could not be written.
    #[error("Payment {payment_intent_id} was captured but the order could not be recorded: {reason}")]
    Reconciliation {
        payment_intent_id: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Store(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(what) => ServiceError::Conflict(format!("Duplicate {}", what)),
            RepositoryError::Storage(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { .. } | TransitionError::AlreadyPaid(_) => {
                ServiceError::Conflict(err.to_string())
            }
            TransitionError::NotPayable(_)
            | TransitionError::IntentMismatch { .. }
            | TransitionError::Rejected(_) => ServiceError::Validation(err.to_string()),
        }
    }
}

impl From<PricingError> for ServiceError {
    fn from(err: PricingError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => ServiceError::NotFound(format!("Product {}", id)),
            other => ServiceError::Validation(other.to_string()),
        }
    }
}
