use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::PricingPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "coreflow.toml";
pub const FALLBACK_CONFIG_FILE: &str = "config/coreflow.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
    /// Required on subscription writes when set.
    pub admin_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub handler_timeout_ms: u64,
    pub past_due_grace_days: u32,
    pub max_batch_size: usize,
    pub remote_base_url: Option<String>,
    pub remote_api_key: Option<SecretString>,
    pub remote_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub currency: String,
    pub max_combined_discount_pct: Decimal,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub server_port: Option<u16>,
    pub admin_token: Option<String>,
    pub remote_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://coreflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                admin_token: None,
            },
            orchestrator: OrchestratorConfig {
                handler_timeout_ms: 5_000,
                past_due_grace_days: 7,
                max_batch_size: 100,
                remote_base_url: None,
                remote_api_key: None,
                remote_timeout_secs: 10,
            },
            pricing: PricingConfig {
                currency: "USD".to_string(),
                max_combined_discount_pct: Decimal::from(45),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PricingConfig {
    pub fn policy(&self) -> PricingPolicy {
        PricingPolicy {
            currency: self.currency.clone(),
            max_combined_discount_pct: self.max_combined_discount_pct,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(admin_token_value) = server.admin_token {
                self.server.admin_token = Some(secret_value(admin_token_value));
            }
        }

        if let Some(orchestrator) = patch.orchestrator {
            if let Some(handler_timeout_ms) = orchestrator.handler_timeout_ms {
                self.orchestrator.handler_timeout_ms = handler_timeout_ms;
            }
            if let Some(past_due_grace_days) = orchestrator.past_due_grace_days {
                self.orchestrator.past_due_grace_days = past_due_grace_days;
            }
            if let Some(max_batch_size) = orchestrator.max_batch_size {
                self.orchestrator.max_batch_size = max_batch_size;
            }
            if let Some(remote_base_url) = orchestrator.remote_base_url {
                self.orchestrator.remote_base_url = Some(remote_base_url);
            }
            if let Some(remote_api_key_value) = orchestrator.remote_api_key {
                self.orchestrator.remote_api_key = Some(secret_value(remote_api_key_value));
            }
            if let Some(remote_timeout_secs) = orchestrator.remote_timeout_secs {
                self.orchestrator.remote_timeout_secs = remote_timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(currency) = pricing.currency {
                self.pricing.currency = currency;
            }
            if let Some(max_combined_discount_pct) = pricing.max_combined_discount_pct {
                self.pricing.max_combined_discount_pct = max_combined_discount_pct;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COREFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("COREFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("COREFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("COREFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("COREFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COREFLOW_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COREFLOW_SERVER_PORT") {
            self.server.port = parse_u16("COREFLOW_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("COREFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COREFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("COREFLOW_SERVER_ADMIN_TOKEN") {
            self.server.admin_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_HANDLER_TIMEOUT_MS") {
            self.orchestrator.handler_timeout_ms =
                parse_u64("COREFLOW_ORCHESTRATOR_HANDLER_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_PAST_DUE_GRACE_DAYS") {
            self.orchestrator.past_due_grace_days =
                parse_u32("COREFLOW_ORCHESTRATOR_PAST_DUE_GRACE_DAYS", &value)?;
        }
        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_MAX_BATCH_SIZE") {
            self.orchestrator.max_batch_size =
                parse_u32("COREFLOW_ORCHESTRATOR_MAX_BATCH_SIZE", &value)? as usize;
        }
        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL") {
            self.orchestrator.remote_base_url = Some(value);
        }
        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_REMOTE_API_KEY") {
            self.orchestrator.remote_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COREFLOW_ORCHESTRATOR_REMOTE_TIMEOUT_SECS") {
            self.orchestrator.remote_timeout_secs =
                parse_u64("COREFLOW_ORCHESTRATOR_REMOTE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COREFLOW_PRICING_CURRENCY") {
            self.pricing.currency = value;
        }
        if let Some(value) = read_env("COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT") {
            self.pricing.max_combined_discount_pct =
                parse_decimal("COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT", &value)?;
        }

        let log_level =
            read_env("COREFLOW_LOGGING_LEVEL").or_else(|| read_env("COREFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COREFLOW_LOGGING_FORMAT").or_else(|| read_env("COREFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(admin_token) = overrides.admin_token {
            self.server.admin_token = Some(secret_value(admin_token));
        }
        if let Some(remote_base_url) = overrides.remote_base_url {
            self.orchestrator.remote_base_url = Some(remote_base_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(FALLBACK_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    let blank_token =
        server.admin_token.as_ref().is_some_and(|token| token.expose_secret().trim().is_empty());
    if blank_token {
        return Err(ConfigError::Validation(
            "server.admin_token must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    if orchestrator.handler_timeout_ms == 0 || orchestrator.handler_timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "orchestrator.handler_timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    if orchestrator.max_batch_size == 0 || orchestrator.max_batch_size > 1_000 {
        return Err(ConfigError::Validation(
            "orchestrator.max_batch_size must be in range 1..=1000".to_string(),
        ));
    }

    if orchestrator.remote_timeout_secs == 0 || orchestrator.remote_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "orchestrator.remote_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match &orchestrator.remote_base_url {
        Some(base_url) => {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "orchestrator.remote_base_url must start with http:// or https://".to_string(),
                ));
            }
        }
        None => {
            if orchestrator.remote_api_key.is_some() {
                return Err(ConfigError::Validation(
                    "orchestrator.remote_api_key is set but orchestrator.remote_base_url is missing"
                        .to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    let currency = pricing.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "pricing.currency must be a three-letter uppercase ISO code".to_string(),
        ));
    }

    let cap = pricing.max_combined_discount_pct;
    if cap < Decimal::ZERO || cap > Decimal::ONE_HUNDRED {
        return Err(ConfigError::Validation(
            "pricing.max_combined_discount_pct must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    orchestrator: Option<OrchestratorPatch>,
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    admin_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratorPatch {
    handler_timeout_ms: Option<u64>,
    past_due_grace_days: Option<u32>,
    max_batch_size: Option<usize>,
    remote_base_url: Option<String>,
    remote_api_key: Option<String>,
    remote_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    currency: Option<String>,
    max_combined_discount_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_without_any_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8080, "default port should be 8080")?;
        ensure(config.orchestrator.handler_timeout_ms == 5_000, "default handler timeout")?;
        ensure(config.orchestrator.past_due_grace_days == 7, "default grace period")?;
        ensure(config.orchestrator.max_batch_size == 100, "default batch size")?;
        ensure(
            config.pricing.policy().max_combined_discount_pct == Decimal::from(45),
            "default discount cap should be 45%",
        )?;
        ensure(config.server.admin_token.is_none(), "admin token is unset by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_COREFLOW_REMOTE_KEY", "remote-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("coreflow.toml");
            fs::write(
                &path,
                r#"
[orchestrator]
remote_base_url = "https://bundles.internal"
remote_api_key = "${TEST_COREFLOW_REMOTE_KEY}"
handler_timeout_ms = 2500

[pricing]
max_combined_discount_pct = 40.5
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .orchestrator
                    .remote_api_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret() == "remote-key-from-env"),
                "remote api key should be interpolated from environment",
            )?;
            ensure(config.orchestrator.handler_timeout_ms == 2_500, "timeout should load from file")?;
            ensure(
                config.pricing.max_combined_discount_pct == Decimal::new(405, 1),
                "discount cap should load from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_COREFLOW_REMOTE_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("coreflow.toml");
        fs::write(&path, "[server]\nadmin_token = \"${COREFLOW_TEST_UNSET_TOKEN}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "COREFLOW_TEST_UNSET_TOKEN"),
            "missing variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREFLOW_LOG_LEVEL", "warn");
        env::set_var("COREFLOW_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["COREFLOW_LOG_LEVEL", "COREFLOW_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREFLOW_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("COREFLOW_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("coreflow.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070
bind_address = "0.0.0.0"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(config.server.bind_address == "0.0.0.0", "file bind address should win")?;
            Ok(())
        })();

        clear_vars(&["COREFLOW_DATABASE_URL", "COREFLOW_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL", "ftp://bundles");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("remote_base_url")
            );
            ensure(has_message, "validation failure should mention remote_base_url")
        })();

        clear_vars(&["COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL"]);
        result
    }

    #[test]
    fn malformed_numeric_env_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT", "lots");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid env override".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT"),
                "invalid override should name its key",
            ),
        };

        clear_vars(&["COREFLOW_PRICING_MAX_COMBINED_DISCOUNT_PCT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("COREFLOW_SERVER_ADMIN_TOKEN", "admin-secret-value");
        env::set_var("COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL", "https://bundles.internal");
        env::set_var("COREFLOW_ORCHESTRATOR_REMOTE_API_KEY", "remote-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("admin-secret-value"), "debug output should not contain admin token")?;
            ensure(
                !debug.contains("remote-secret-value"),
                "debug output should not contain remote api key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "COREFLOW_SERVER_ADMIN_TOKEN",
            "COREFLOW_ORCHESTRATOR_REMOTE_BASE_URL",
            "COREFLOW_ORCHESTRATOR_REMOTE_API_KEY",
        ]);
        result
    }
}
