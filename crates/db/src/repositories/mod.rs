use async_trait::async_trait;
use thiserror::Error;

use coreflow_core::domain::run::OrchestrationRun;
use coreflow_core::domain::subscription::Subscription;
use coreflow_core::domain::tenant::TenantId;

pub mod memory;
pub mod run_log;
pub mod subscription;

pub use memory::{InMemoryRunLogRepository, InMemorySubscriptionRepository};
pub use run_log::SqlRunLogRepository;
pub use subscription::SqlSubscriptionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, RepositoryError>;

    /// Inserts or replaces the tenant's subscription, including its bundle list.
    async fn save(&self, subscription: Subscription) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RunLogRepository: Send + Sync {
    async fn find_by_request(
        &self,
        tenant_id: &TenantId,
        request_id: &str,
    ) -> Result<Option<OrchestrationRun>, RepositoryError>;

    async fn record(&self, run: OrchestrationRun) -> Result<(), RepositoryError>;

    /// Most recent runs first.
    async fn list_recent(
        &self,
        tenant_id: &TenantId,
        limit: u32,
    ) -> Result<Vec<OrchestrationRun>, RepositoryError>;
}
