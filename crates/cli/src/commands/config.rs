use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use coreflow_core::config::{AppConfig, DEFAULT_CONFIG_FILE, FALLBACK_CONFIG_FILE};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, to_data, CommandResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigField {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
struct EffectiveConfig {
    config_file: Option<String>,
    fields: Vec<ConfigField>,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let fields = effective_fields(&config, config_file_path.as_deref());
    let report = EffectiveConfig {
        config_file: config_file_path.map(|path| path.display().to_string()),
        fields,
    };

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        to_data(&report),
    )
}

/// Every effective value paired with the layer that supplied it. Secrets are redacted.
pub fn effective_fields(config: &AppConfig, config_file_path: Option<&Path>) -> Vec<ConfigField> {
    let doc = load_config_file_doc(config_file_path);
    let field = |key: &'static str, value: String, env_keys: &[&str]| ConfigField {
        key,
        value,
        source: field_source(key, env_keys, doc.as_ref(), config_file_path),
    };

    vec![
        field("database.url", config.database.url.clone(), &["COREFLOW_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["COREFLOW_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["COREFLOW_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["COREFLOW_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["COREFLOW_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["COREFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "server.admin_token",
            redact_secret(config.server.admin_token.as_ref()),
            &["COREFLOW_SERVER_ADMIN_TOKEN"],
        ),
        field(
            "orchestrator.handler_timeout_ms",
            config.orchestrator.handler_timeout_ms.to_string(),
            &["COREFLOW_ORCHESTRATOR_HANDLER_TIMEOUT_MS"],
        ),
        field(
            "orchestrator.past_due_grace_days",
            config.orchestrator.past_due_grace_days.to_string(),
            &["COREFLOW_ORCHESTRATOR_PAST_DUE_GRACE_DAYS"],
        ),
        field(
            "orchestrator.max_batch_size",
            config.orchestrator.max_batch_size.to_string(),
            &["COREFLOW_ORCHESTRATOR_MAX_BATCH_SIZE"],
        ),
        field(
            "orchestrator.remote_base_url",
            config.orchestrator.remote_base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL"],
        ),
        field(
            "orchestrator.remote_api_key",
            redact_secret(config.orchestrator.remote_api_key.as_ref()),
            &["COREFLOW_ORCHESTRATOR_REMOTE_API_KEY"],
        ),
        field(
            "orchestrator.remote_timeout_secs",
            config.orchestrator.remote_timeout_secs.to_string(),
            &["COREFLOW_ORCHESTRATOR_REMOTE_TIMEOUT_SECS"],
        ),
        field("pricing.currency", config.pricing.currency.clone(), &["COREFLOW_PRICING_CURRENCY"]),
        field(
            "pricing.max_combined_discount_pct",
            config.pricing.max_combined_discount_pct.to_string(),
            &["COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["COREFLOW_LOGGING_LEVEL", "COREFLOW_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["COREFLOW_LOGGING_FORMAT", "COREFLOW_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILE, FALLBACK_CONFIG_FILE]
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret.map(|value| value.expose_secret().trim().is_empty()) {
        None => "<unset>".to_string(),
        Some(true) => "<empty>".to_string(),
        Some(false) => "<redacted>".to_string(),
    }
}
