use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use coreflow_core::config::OrchestratorConfig;

use crate::handler::{BundleHandler, HandlerContext, HandlerHealth};

/// Forwards workflows to an external bundle service over HTTP.
pub struct RemoteBundleHandler {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl RemoteBundleHandler {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }

    /// Returns `None` when no remote base URL is configured.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(base_url) = config.remote_base_url.as_deref() else {
            return Ok(None);
        };
        Self::new(
            base_url,
            config.remote_api_key.clone(),
            Duration::from_secs(config.remote_timeout_secs),
        )
        .map(Some)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn workflow_url(&self, ctx: &HandlerContext, workflow: &str) -> String {
        format!("{}/v1/bundles/{}/workflows/{}", self.base_url, ctx.bundle_id, workflow)
    }
}

#[async_trait]
impl BundleHandler for RemoteBundleHandler {
    fn name(&self) -> &str {
        "remote"
    }

    async fn execute(&self, ctx: &HandlerContext, workflow: &str, input: Value) -> Result<Value> {
        let url = self.workflow_url(ctx, workflow);
        let mut request = self
            .client
            .post(&url)
            .header("x-request-id", ctx.correlation_id.as_str())
            .json(&json!({ "tenant_id": ctx.tenant_id, "input": input }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.with_context(|| format!("remote bundle call to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("remote bundle service returned {status} for {url}");
        }

        response.json::<Value>().await.context("remote bundle service returned invalid JSON")
    }

    fn capabilities(&self) -> Value {
        json!({ "service": "remote", "base_url": self.base_url })
    }

    async fn health(&self) -> HandlerHealth {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => HandlerHealth::healthy(),
            Ok(response) => {
                HandlerHealth::unavailable(format!("health endpoint returned {}", response.status()))
            }
            Err(error) => HandlerHealth::unavailable(format!("health check failed: {error}")),
        }
    }
}
