use thiserror::Error;

use coreflow_core::domain::bundle::BundleId;
use coreflow_core::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("invalid orchestration request: {0}")]
    InvalidRequest(String),
    #[error("unknown bundle `{0}`")]
    UnknownBundle(BundleId),
    #[error("bundle `{bundle_id}` does not support workflow `{workflow}`")]
    UnsupportedWorkflow { bundle_id: BundleId, workflow: String },
    #[error("entitlement denied ({reason_code}): {user_message}")]
    Denied { reason_code: &'static str, user_message: String },
    #[error("batch of {size} requests exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
    #[error("run log persistence failed: {0}")]
    Persistence(String),
}

impl OrchestrationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownBundle(_) => "unknown_bundle",
            Self::UnsupportedWorkflow { .. } => "unsupported_workflow",
            Self::Denied { .. } => "entitlement_denied",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::Persistence(_) => "persistence_failure",
        }
    }
}

impl From<OrchestrationError> for ApplicationError {
    fn from(value: OrchestrationError) -> Self {
        match value {
            OrchestrationError::InvalidRequest(_) | OrchestrationError::BatchTooLarge { .. } => {
                ApplicationError::Domain(DomainError::InvariantViolation(value.to_string()))
            }
            OrchestrationError::UnknownBundle(_) => ApplicationError::NotFound(value.to_string()),
            OrchestrationError::UnsupportedWorkflow { .. } => {
                ApplicationError::Unprocessable(value.to_string())
            }
            OrchestrationError::Denied { reason_code, user_message } => {
                ApplicationError::Entitlement(format!("{reason_code}: {user_message}"))
            }
            OrchestrationError::Persistence(message) => ApplicationError::Persistence(message),
        }
    }
}
