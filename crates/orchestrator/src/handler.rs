use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use coreflow_core::domain::bundle::BundleId;
use coreflow_core::domain::tenant::TenantId;

/// Per-call context handed to every handler in a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerContext {
    pub tenant_id: TenantId,
    pub bundle_id: BundleId,
    pub correlation_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HandlerHealth {
    pub fn healthy() -> Self {
        Self { status: HealthStatus::Healthy, detail: None }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self { status: HealthStatus::Unavailable, detail: Some(detail.into()) }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[async_trait]
pub trait BundleHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &HandlerContext, workflow: &str, input: Value) -> Result<Value>;

    fn capabilities(&self) -> Value;

    async fn health(&self) -> HandlerHealth;
}
