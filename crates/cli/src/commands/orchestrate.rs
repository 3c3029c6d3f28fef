use std::fs;
use std::sync::Arc;

use coreflow_core::{BundleCatalog, BundleId, TenantId, TracingAuditSink};
use coreflow_db::{SqlRunLogRepository, SqlSubscriptionRepository};
use coreflow_orchestrator::{
    BundleRegistry, EntitlementPolicy, OrchestrationError, OrchestrationRequest, Orchestrator,
    OrchestratorSettings,
};
use serde_json::Value;

use crate::commands::{
    load_config, open_database, runtime, to_data, CommandResult, EXIT_CONFIG, EXIT_DATABASE,
    EXIT_FAILED, EXIT_INVALID_INPUT,
};

#[derive(Clone, Debug)]
pub struct OrchestrateArgs {
    pub tenant: String,
    pub bundle: String,
    pub workflow: String,
    /// Inline JSON, or `@path` to read it from a file.
    pub input: String,
    pub request_id: Option<String>,
}

pub fn run(args: OrchestrateArgs) -> CommandResult {
    let input = match parse_input(&args.input) {
        Ok(input) => input,
        Err(message) => {
            return CommandResult::failure(
                "orchestrate",
                "invalid_input",
                message,
                EXIT_INVALID_INPUT,
            );
        }
    };
    let config = match load_config("orchestrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("orchestrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let request = OrchestrationRequest {
        tenant_id: TenantId(args.tenant),
        bundle_id: BundleId(args.bundle),
        workflow: args.workflow,
        input,
        request_id: args.request_id,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let catalog = BundleCatalog::standard();
        let registry = BundleRegistry::from_config(&catalog, &config.orchestrator)
            .map_err(|error| ("remote_client", error.to_string(), EXIT_CONFIG))?;
        let orchestrator = Orchestrator::new(
            Arc::new(catalog),
            Arc::new(registry),
            EntitlementPolicy::new(config.orchestrator.past_due_grace_days),
            Arc::new(SqlSubscriptionRepository::new(pool.clone())),
            Arc::new(SqlRunLogRepository::new(pool.clone())),
            Arc::new(TracingAuditSink),
            OrchestratorSettings::from(&config.orchestrator),
        );

        let outcome = orchestrator
            .orchestrate(request)
            .await
            .map_err(|error| (error.error_code(), error.to_string(), exit_code_for(&error)));
        pool.close().await;
        outcome
    });

    match result {
        Ok(result) => {
            let message = match (&result.handler, result.replayed) {
                (_, true) => format!("replayed run {}", result.run_id.0),
                (Some(handler), false) => format!("completed by {handler}"),
                (None, false) => format!(
                    "fallback: {}",
                    result.fallback_reason.as_deref().unwrap_or("unspecified")
                ),
            };
            CommandResult::success_with("orchestrate", message, to_data(&result))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("orchestrate", error_class, message, exit_code)
        }
    }
}

fn exit_code_for(error: &OrchestrationError) -> u8 {
    match error {
        OrchestrationError::InvalidRequest(_)
        | OrchestrationError::UnknownBundle(_)
        | OrchestrationError::UnsupportedWorkflow { .. }
        | OrchestrationError::BatchTooLarge { .. } => EXIT_INVALID_INPUT,
        OrchestrationError::Denied { .. } => EXIT_FAILED,
        OrchestrationError::Persistence(_) => EXIT_DATABASE,
    }
}

fn parse_input(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    let text = match trimmed.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .map_err(|error| format!("could not read input file `{path}`: {error}"))?,
        None => trimmed.to_string(),
    };
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&text).map_err(|error| format!("input is not valid JSON: {error}"))
}
