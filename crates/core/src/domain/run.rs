use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::bundle::BundleId;
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(format!("RUN-{}", uuid::Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatus {
    Completed,
    Fallback,
}

impl OrchestrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for OrchestrationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "completed" => Ok(Self::Completed),
            "fallback" => Ok(Self::Fallback),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown orchestration status `{other}`"
            ))),
        }
    }
}

/// A finished workflow execution as stored in the run log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub run_id: RunId,
    pub request_id: Option<String>,
    pub tenant_id: TenantId,
    pub bundle_id: BundleId,
    pub workflow: String,
    pub status: OrchestrationStatus,
    pub handler: Option<String>,
    pub output: Value,
    pub confidence: Option<f64>,
    pub fallback_reason: Option<String>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}
