use coreflow_core::config::{AppConfig, LoadOptions};
use coreflow_core::BundleCatalog;
use coreflow_db::{connect_with_config, ping};
use coreflow_orchestrator::BundleRegistry;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DATABASE, EXIT_FAILED, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: EXIT_OK }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
            exit_code: EXIT_OK,
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    /// Exit code of the first failing check.
    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find(|check| check.status == CheckStatus::Fail)
            .map_or(EXIT_OK, |check| check.exit_code)
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_database_connectivity(&config)));
                    checks.push(runtime.block_on(check_bundle_handlers(&config)));
                }
                Err(error) => checks.push(DoctorCheck::fail(
                    "runtime_init",
                    format!("failed to initialize async runtime: {error}"),
                    EXIT_FAILED,
                )),
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string(), EXIT_CONFIG));
            checks.push(DoctorCheck::skipped("database_connectivity"));
            checks.push(DoctorCheck::skipped("bundle_handlers"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let pool = match connect_with_config(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to connect to database: {error}"),
                EXIT_DATABASE,
            );
        }
    };

    let probe = ping(&pool).await;
    pool.close().await;
    match probe {
        Ok(()) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::fail(
            "database_connectivity",
            format!("database probe failed: {error}"),
            EXIT_DATABASE,
        ),
    }
}

async fn check_bundle_handlers(config: &AppConfig) -> DoctorCheck {
    let catalog = BundleCatalog::standard();
    let registry = match BundleRegistry::from_config(&catalog, &config.orchestrator) {
        Ok(registry) => registry,
        Err(error) => {
            return DoctorCheck::fail(
                "bundle_handlers",
                format!("remote handler client could not be built: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let mut unavailable = Vec::new();
    for bundle in catalog.all() {
        let mut healthy = false;
        for handler in registry.handlers(&bundle.id) {
            healthy |= handler.health().await.is_healthy();
        }
        if !healthy {
            unavailable.push(bundle.id.to_string());
        }
    }

    if unavailable.is_empty() {
        DoctorCheck::pass(
            "bundle_handlers",
            format!("{} bundles have a healthy handler", catalog.all().len()),
        )
    } else {
        DoctorCheck::fail(
            "bundle_handlers",
            format!("no healthy handler for: {}", unavailable.join(", ")),
            EXIT_FAILED,
        )
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
