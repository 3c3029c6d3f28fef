use std::collections::HashMap;

use tokio::sync::RwLock;

use coreflow_core::domain::run::OrchestrationRun;
use coreflow_core::domain::subscription::Subscription;
use coreflow_core::domain::tenant::TenantId;

use super::{RepositoryError, RunLogRepository, SubscriptionRepository};

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn with_subscriptions(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let subscriptions = subscriptions
            .into_iter()
            .map(|subscription| (subscription.tenant_id.0.clone(), subscription))
            .collect();
        Self { subscriptions: RwLock::new(subscriptions) }
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(&tenant_id.0).cloned())
    }

    async fn save(&self, subscription: Subscription) -> Result<(), RepositoryError> {
        let mut subscriptions = self.subscriptions.write().await;
        let mut subscription = subscription;
        if let Some(existing) = subscriptions.get(&subscription.tenant_id.0) {
            subscription.id = existing.id.clone();
            subscription.created_at = existing.created_at;
        }
        subscriptions.insert(subscription.tenant_id.0.clone(), subscription);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRunLogRepository {
    runs: RwLock<Vec<OrchestrationRun>>,
}

#[async_trait::async_trait]
impl RunLogRepository for InMemoryRunLogRepository {
    async fn find_by_request(
        &self,
        tenant_id: &TenantId,
        request_id: &str,
    ) -> Result<Option<OrchestrationRun>, RepositoryError> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .find(|run| {
                &run.tenant_id == tenant_id && run.request_id.as_deref() == Some(request_id)
            })
            .cloned())
    }

    async fn record(&self, run: OrchestrationRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        let duplicate = run.request_id.as_deref().is_some_and(|request_id| {
            runs.iter().any(|existing| {
                existing.tenant_id == run.tenant_id
                    && existing.request_id.as_deref() == Some(request_id)
            })
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "run for request `{}` already recorded",
                run.request_id.as_deref().unwrap_or_default()
            )));
        }
        runs.push(run);
        Ok(())
    }

    async fn list_recent(
        &self,
        tenant_id: &TenantId,
        limit: u32,
    ) -> Result<Vec<OrchestrationRun>, RepositoryError> {
        let runs = self.runs.read().await;
        let mut matching: Vec<(usize, &OrchestrationRun)> =
            runs.iter().enumerate().filter(|(_, run)| &run.tenant_id == tenant_id).collect();
        matching.sort_by(|(left_idx, left), (right_idx, right)| {
            right.completed_at.cmp(&left.completed_at).then(right_idx.cmp(left_idx))
        });
        Ok(matching.into_iter().take(limit as usize).map(|(_, run)| run.clone()).collect())
    }
}
