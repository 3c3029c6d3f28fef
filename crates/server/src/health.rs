use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use coreflow_db::{ping, DbPool};
use coreflow_orchestrator::{Orchestrator, OrchestratorHealth};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub handlers: OrchestratorHealth,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let handlers = state.orchestrator.health().await;
    let ready = database.status == "ready" && handlers.ready;

    if !ready {
        warn!(
            event_name = "system.health.degraded",
            correlation_id = "health",
            database = database.status,
            handlers_ready = handlers.ready,
            "health check degraded"
        );
    }

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "coreflow-server runtime initialized".to_string(),
        },
        database,
        handlers,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use coreflow_core::{BundleCatalog, InMemoryAuditSink};
    use coreflow_db::{
        connect_with_settings, DbPool, InMemoryRunLogRepository, InMemorySubscriptionRepository,
    };
    use coreflow_orchestrator::{
        BundleHandler, BundleRegistry, EntitlementPolicy, HandlerContext, HandlerHealth,
        Orchestrator, OrchestratorSettings,
    };
    use serde_json::Value;

    use crate::health::{health, HealthState};

    struct DownHandler;

    #[async_trait]
    impl BundleHandler for DownHandler {
        fn name(&self) -> &str {
            "down"
        }

        async fn execute(
            &self,
            _ctx: &HandlerContext,
            _workflow: &str,
            _input: Value,
        ) -> anyhow::Result<Value> {
            anyhow::bail!("offline")
        }

        fn capabilities(&self) -> Value {
            Value::Null
        }

        async fn health(&self) -> HandlerHealth {
            HandlerHealth::unavailable("offline")
        }
    }

    fn orchestrator(registry: BundleRegistry) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::new(BundleCatalog::standard()),
            Arc::new(registry),
            EntitlementPolicy::default(),
            Arc::new(InMemorySubscriptionRepository::default()),
            Arc::new(InMemoryRunLogRepository::default()),
            Arc::new(InMemoryAuditSink::default()),
            OrchestratorSettings::default(),
        ))
    }

    async fn pool() -> DbPool {
        connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect")
    }

    #[tokio::test]
    async fn health_returns_ready_when_database_and_handlers_are_up() {
        let pool = pool().await;
        let registry = BundleRegistry::local(&BundleCatalog::standard());

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            orchestrator: orchestrator(registry),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert!(payload.handlers.ready);
        assert_eq!(payload.handlers.bundles.len(), 4);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = pool().await;
        pool.close().await;
        let registry = BundleRegistry::local(&BundleCatalog::standard());

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, orchestrator: orchestrator(registry) }))
                .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_when_a_bundle_has_no_healthy_handler() {
        let pool = pool().await;
        let mut registry = BundleRegistry::default();
        registry.register("finance_ai_fingpt".into(), Arc::new(DownHandler));

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            orchestrator: orchestrator(registry),
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "ready");
        assert!(!payload.handlers.ready);

        pool.close().await;
    }
}
