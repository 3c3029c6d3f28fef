use std::sync::Arc;

use coreflow_core::config::{AppConfig, ConfigError, LoadOptions};
use coreflow_core::{AuditSink, BundleCatalog, DeterministicPricingEngine, TracingAuditSink};
use coreflow_db::{
    connect_with_config, migrations, DbPool, SqlRunLogRepository, SqlSubscriptionRepository,
};
use coreflow_orchestrator::{BundleRegistry, EntitlementPolicy, Orchestrator, OrchestratorSettings};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub api: ApiState,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState { db_pool: self.db_pool.clone(), orchestrator: Arc::clone(&self.orchestrator) }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("remote bundle client could not be built: {0}")]
    RemoteClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let catalog = BundleCatalog::standard();
    let registry = BundleRegistry::from_config(&catalog, &config.orchestrator)
        .map_err(BootstrapError::RemoteClient)?;

    let subscriptions = Arc::new(SqlSubscriptionRepository::new(db_pool.clone()));
    let runs = Arc::new(SqlRunLogRepository::new(db_pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(catalog),
        Arc::new(registry),
        EntitlementPolicy::new(config.orchestrator.past_due_grace_days),
        subscriptions.clone(),
        runs.clone(),
        audit.clone(),
        OrchestratorSettings::from(&config.orchestrator),
    ));
    let pricing = Arc::new(DeterministicPricingEngine::with_policy(config.pricing.policy()));

    let api = ApiState::new(
        Arc::clone(&orchestrator),
        pricing,
        subscriptions,
        runs,
        audit,
        config.server.admin_token.as_ref(),
    );

    Ok(Application { config, db_pool, orchestrator, api })
}
