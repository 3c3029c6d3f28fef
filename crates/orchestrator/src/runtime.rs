use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use coreflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use coreflow_core::catalog::BundleCatalog;
use coreflow_core::config::OrchestratorConfig;
use coreflow_core::domain::bundle::{BundleDefinition, BundleId};
use coreflow_core::domain::run::{OrchestrationRun, OrchestrationStatus, RunId};
use coreflow_core::domain::tenant::TenantId;
use coreflow_db::repositories::{RunLogRepository, SubscriptionRepository};

use crate::entitlement::{EntitlementDecision, EntitlementPolicy};
use crate::error::OrchestrationError;
use crate::handler::{HandlerContext, HandlerHealth};
use crate::registry::BundleRegistry;

const ACTOR: &str = "orchestrator";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub tenant_id: TenantId,
    pub bundle_id: BundleId,
    pub workflow: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
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
    pub replayed: bool,
    pub completed_at: DateTime<Utc>,
}

impl OrchestrationResult {
    pub fn from_run(run: OrchestrationRun, replayed: bool) -> Self {
        Self {
            run_id: run.run_id,
            request_id: run.request_id,
            tenant_id: run.tenant_id,
            bundle_id: run.bundle_id,
            workflow: run.workflow,
            status: run.status,
            handler: run.handler,
            output: run.output,
            confidence: run.confidence,
            fallback_reason: run.fallback_reason,
            duration_ms: run.duration_ms,
            replayed,
            completed_at: run.completed_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub handler_timeout: Duration,
    pub max_batch_size: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { handler_timeout: Duration::from_millis(5_000), max_batch_size: 100 }
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            handler_timeout: Duration::from_millis(config.handler_timeout_ms),
            max_batch_size: config.max_batch_size,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HandlerHealthReport {
    pub name: String,
    #[serde(flatten)]
    pub health: HandlerHealth,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BundleHealth {
    pub bundle_id: BundleId,
    pub available: bool,
    pub handlers: Vec<HandlerHealthReport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrchestratorHealth {
    pub ready: bool,
    pub bundles: Vec<BundleHealth>,
}

enum Execution {
    Completed { handler: String, output: Value },
    Fallback { reason: &'static str, message: String },
}

/// Routes workflow requests to bundle handler chains, subject to entitlement.
pub struct Orchestrator {
    catalog: Arc<BundleCatalog>,
    registry: Arc<BundleRegistry>,
    entitlements: EntitlementPolicy,
    subscriptions: Arc<dyn SubscriptionRepository>,
    runs: Arc<dyn RunLogRepository>,
    audit: Arc<dyn AuditSink>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<BundleCatalog>,
        registry: Arc<BundleRegistry>,
        entitlements: EntitlementPolicy,
        subscriptions: Arc<dyn SubscriptionRepository>,
        runs: Arc<dyn RunLogRepository>,
        audit: Arc<dyn AuditSink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { catalog, registry, entitlements, subscriptions, runs, audit, settings }
    }

    pub fn catalog(&self) -> &BundleCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub async fn orchestrate(
        &self,
        request: OrchestrationRequest,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        let correlation_id =
            request.request_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.orchestrate_with_correlation(request, &correlation_id).await
    }

    pub async fn orchestrate_with_correlation(
        &self,
        request: OrchestrationRequest,
        correlation_id: &str,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        let started = Instant::now();
        validate_request(&request)?;

        if let Some(request_id) = request.request_id.as_deref() {
            if let Some(previous) = self.replay(&request.tenant_id, request_id, correlation_id).await? {
                return Ok(previous);
            }
        }

        let bundle = self
            .catalog
            .find(&request.bundle_id)
            .ok_or_else(|| OrchestrationError::UnknownBundle(request.bundle_id.clone()))?;
        if !bundle.supports(&request.workflow) {
            return Err(OrchestrationError::UnsupportedWorkflow {
                bundle_id: request.bundle_id.clone(),
                workflow: request.workflow.clone(),
            });
        }

        let decision = self.evaluate_entitlement(&request, bundle, correlation_id).await?;
        let execution = match decision {
            EntitlementDecision::Deny { reason_code, user_message } => {
                return Err(OrchestrationError::Denied { reason_code, user_message });
            }
            EntitlementDecision::Degrade { reason_code, user_message } => {
                Execution::Fallback { reason: reason_code, message: user_message }
            }
            EntitlementDecision::Allow => self.execute_chain(&request, bundle, correlation_id).await,
        };

        let run = build_run(request, execution, started.elapsed());
        self.persist(run, correlation_id).await
    }

    /// Runs every request concurrently; results keep the input order.
    pub async fn orchestrate_batch(
        &self,
        requests: Vec<OrchestrationRequest>,
    ) -> Result<Vec<Result<OrchestrationResult, OrchestrationError>>, OrchestrationError> {
        if requests.len() > self.settings.max_batch_size {
            return Err(OrchestrationError::BatchTooLarge {
                size: requests.len(),
                max: self.settings.max_batch_size,
            });
        }

        debug!(event_name = "orchestration.batch.started", size = requests.len(), "batch started");
        Ok(join_all(requests.into_iter().map(|request| self.orchestrate(request))).await)
    }

    pub async fn health(&self) -> OrchestratorHealth {
        let mut bundles = Vec::with_capacity(self.catalog.all().len());
        for bundle in self.catalog.all() {
            let mut handlers = Vec::new();
            for handler in self.registry.handlers(&bundle.id) {
                handlers.push(HandlerHealthReport {
                    name: handler.name().to_string(),
                    health: handler.health().await,
                });
            }
            let available = handlers.iter().any(|report| report.health.is_healthy());
            bundles.push(BundleHealth { bundle_id: bundle.id.clone(), available, handlers });
        }

        OrchestratorHealth { ready: bundles.iter().all(|bundle| bundle.available), bundles }
    }

    async fn replay(
        &self,
        tenant_id: &TenantId,
        request_id: &str,
        correlation_id: &str,
    ) -> Result<Option<OrchestrationResult>, OrchestrationError> {
        let previous = self
            .runs
            .find_by_request(tenant_id, request_id)
            .await
            .map_err(|error| OrchestrationError::Persistence(error.to_string()))?;

        let Some(run) = previous else {
            return Ok(None);
        };

        info!(
            event_name = "orchestration.replayed",
            correlation_id,
            tenant_id = %tenant_id,
            run_id = %run.run_id.0,
            "returning previously recorded run"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(tenant_id.clone()),
                correlation_id,
                "orchestration.replayed",
                AuditCategory::Orchestration,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("run_id", run.run_id.0.clone())
            .with_metadata("request_id", request_id),
        );

        Ok(Some(OrchestrationResult::from_run(run, true)))
    }

    async fn evaluate_entitlement(
        &self,
        request: &OrchestrationRequest,
        bundle: &BundleDefinition,
        correlation_id: &str,
    ) -> Result<EntitlementDecision, OrchestrationError> {
        let subscription = self
            .subscriptions
            .find_by_tenant(&request.tenant_id)
            .await
            .map_err(|error| OrchestrationError::Persistence(error.to_string()))?;
        let decision = self.entitlements.evaluate(subscription.as_ref(), bundle, Utc::now());

        let outcome = match decision {
            EntitlementDecision::Allow => AuditOutcome::Success,
            EntitlementDecision::Degrade { .. } => AuditOutcome::Degraded,
            EntitlementDecision::Deny { .. } => AuditOutcome::Rejected,
        };
        let mut event = AuditEvent::new(
            Some(request.tenant_id.clone()),
            correlation_id,
            "entitlement.evaluated",
            AuditCategory::Entitlement,
            ACTOR,
            outcome,
        )
        .with_metadata("bundle_id", bundle.id.0.clone())
        .with_metadata("decision", decision.label());
        if let Some(reason_code) = decision.reason_code() {
            event = event.with_metadata("reason_code", reason_code);
            warn!(
                event_name = "orchestration.entitlement.restricted",
                correlation_id,
                tenant_id = %request.tenant_id,
                bundle_id = %bundle.id,
                decision = decision.label(),
                reason_code,
                "entitlement restricted workflow"
            );
        }
        self.audit.emit(event);

        Ok(decision)
    }

    async fn execute_chain(
        &self,
        request: &OrchestrationRequest,
        bundle: &BundleDefinition,
        correlation_id: &str,
    ) -> Execution {
        let chain = self.registry.handlers(&bundle.id);
        if chain.is_empty() {
            return Execution::Fallback {
                reason: "no_handler_registered",
                message: format!("{} has no handler configured.", bundle.name),
            };
        }

        let ctx = HandlerContext {
            tenant_id: request.tenant_id.clone(),
            bundle_id: bundle.id.clone(),
            correlation_id: correlation_id.to_string(),
        };

        for handler in chain {
            let call = handler.execute(&ctx, &request.workflow, request.input.clone());
            match tokio::time::timeout(self.settings.handler_timeout, call).await {
                Ok(Ok(output)) => {
                    return Execution::Completed { handler: handler.name().to_string(), output };
                }
                Ok(Err(error)) => warn!(
                    event_name = "orchestration.handler.failed",
                    correlation_id,
                    tenant_id = %request.tenant_id,
                    bundle_id = %bundle.id,
                    handler = handler.name(),
                    error = %format!("{error:#}"),
                    "handler failed; trying next"
                ),
                Err(_) => warn!(
                    event_name = "orchestration.handler.timeout",
                    correlation_id,
                    tenant_id = %request.tenant_id,
                    bundle_id = %bundle.id,
                    handler = handler.name(),
                    timeout_ms = self.settings.handler_timeout.as_millis() as u64,
                    "handler timed out; trying next"
                ),
            }
        }

        Execution::Fallback {
            reason: "handlers_unavailable",
            message: format!("{} is temporarily unavailable. Please retry shortly.", bundle.name),
        }
    }

    async fn persist(
        &self,
        run: OrchestrationRun,
        correlation_id: &str,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        if let Err(error) = self.runs.record(run.clone()).await {
            // A concurrent request with the same id may have won the insert.
            if let Some(request_id) = run.request_id.as_deref() {
                if let Some(previous) = self.replay(&run.tenant_id, request_id, correlation_id).await? {
                    return Ok(previous);
                }
            }

            self.audit.emit(
                AuditEvent::new(
                    Some(run.tenant_id.clone()),
                    correlation_id,
                    "run.persist_failed",
                    AuditCategory::Persistence,
                    ACTOR,
                    AuditOutcome::Failed,
                )
                .with_metadata("run_id", run.run_id.0.clone())
                .with_metadata("error", error.to_string()),
            );
            return Err(OrchestrationError::Persistence(error.to_string()));
        }

        let (event_type, outcome) = match run.status {
            OrchestrationStatus::Completed => ("orchestration.completed", AuditOutcome::Success),
            OrchestrationStatus::Fallback => ("orchestration.fallback", AuditOutcome::Degraded),
        };
        let mut event = AuditEvent::new(
            Some(run.tenant_id.clone()),
            correlation_id,
            event_type,
            AuditCategory::Orchestration,
            ACTOR,
            outcome,
        )
        .with_metadata("run_id", run.run_id.0.clone())
        .with_metadata("bundle_id", run.bundle_id.0.clone())
        .with_metadata("workflow", run.workflow.clone())
        .with_metadata("duration_ms", run.duration_ms.to_string());
        if let Some(handler) = &run.handler {
            event = event.with_metadata("handler", handler.clone());
        }
        if let Some(reason) = &run.fallback_reason {
            event = event.with_metadata("fallback_reason", reason.clone());
        }
        self.audit.emit(event);

        info!(
            event_name = event_type,
            correlation_id,
            tenant_id = %run.tenant_id,
            bundle_id = %run.bundle_id,
            workflow = %run.workflow,
            run_id = %run.run_id.0,
            duration_ms = run.duration_ms,
            "workflow orchestrated"
        );

        Ok(OrchestrationResult::from_run(run, false))
    }
}

fn validate_request(request: &OrchestrationRequest) -> Result<(), OrchestrationError> {
    if request.tenant_id.is_blank() {
        return Err(OrchestrationError::InvalidRequest("tenant_id is required".to_string()));
    }
    if request.bundle_id.as_str().trim().is_empty() {
        return Err(OrchestrationError::InvalidRequest("bundle_id is required".to_string()));
    }
    if request.workflow.trim().is_empty() {
        return Err(OrchestrationError::InvalidRequest("workflow is required".to_string()));
    }
    if request.request_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(OrchestrationError::InvalidRequest(
            "request_id must not be blank when provided".to_string(),
        ));
    }
    Ok(())
}

fn build_run(request: OrchestrationRequest, execution: Execution, elapsed: Duration) -> OrchestrationRun {
    let (status, handler, output, fallback_reason) = match execution {
        Execution::Completed { handler, output } => {
            (OrchestrationStatus::Completed, Some(handler), output, None)
        }
        Execution::Fallback { reason, message } => (
            OrchestrationStatus::Fallback,
            None,
            fallback_response(&request.bundle_id, &request.workflow, reason, &message),
            Some(reason.to_string()),
        ),
    };

    OrchestrationRun {
        run_id: RunId::generate(),
        request_id: request.request_id,
        tenant_id: request.tenant_id,
        bundle_id: request.bundle_id,
        workflow: request.workflow,
        status,
        handler,
        confidence: extract_confidence(&output),
        output,
        fallback_reason,
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        completed_at: Utc::now(),
    }
}

pub fn fallback_response(bundle_id: &BundleId, workflow: &str, reason: &str, message: &str) -> Value {
    json!({
        "status": "fallback",
        "bundle_id": bundle_id,
        "workflow": workflow,
        "reason": reason,
        "message": message,
        "confidence": 0.0,
    })
}

/// Top-level `confidence`, else `forecast_summary.confidence_score`.
pub fn extract_confidence(output: &Value) -> Option<f64> {
    output
        .get("confidence")
        .and_then(Value::as_f64)
        .or_else(|| output.pointer("/forecast_summary/confidence_score").and_then(Value::as_f64))
}
