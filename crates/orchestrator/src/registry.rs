use std::collections::BTreeMap;
use std::sync::Arc;

use coreflow_core::catalog::BundleCatalog;
use coreflow_core::config::OrchestratorConfig;
use coreflow_core::domain::bundle::{BundleId, BundleService};
use tracing::info;

use crate::handler::BundleHandler;
use crate::handlers::local::{ErpNextHandler, FinGptHandler, FinRobotHandler};
use crate::handlers::remote::RemoteBundleHandler;

/// Ordered handler chains keyed by bundle. The first handler that succeeds wins.
#[derive(Default)]
pub struct BundleRegistry {
    chains: BTreeMap<BundleId, Vec<Arc<dyn BundleHandler>>>,
}

impl BundleRegistry {
    /// One local engine handler per catalog bundle.
    pub fn local(catalog: &BundleCatalog) -> Self {
        let fingpt: Arc<dyn BundleHandler> = Arc::new(FinGptHandler::default());
        let finrobot: Arc<dyn BundleHandler> = Arc::new(FinRobotHandler::default());
        let erpnext: Arc<dyn BundleHandler> = Arc::new(ErpNextHandler::default());

        let mut registry = Self::default();
        for bundle in catalog.all() {
            let handler = match bundle.service {
                BundleService::FinGpt => Arc::clone(&fingpt),
                BundleService::FinRobot => Arc::clone(&finrobot),
                BundleService::ErpNext => Arc::clone(&erpnext),
            };
            registry.register(bundle.id.clone(), handler);
        }
        registry
    }

    /// Local engines, fronted by the remote handler when one is configured.
    pub fn from_config(
        catalog: &BundleCatalog,
        config: &OrchestratorConfig,
    ) -> Result<Self, reqwest::Error> {
        let mut registry = Self::local(catalog);
        if let Some(remote) = RemoteBundleHandler::from_config(config)? {
            info!(
                event_name = "orchestration.registry.remote_enabled",
                base_url = remote.base_url(),
                "remote bundle handler placed ahead of local engines"
            );
            registry.prepend_to_all(Arc::new(remote));
        }
        Ok(registry)
    }

    /// Appends a handler to the end of the bundle's chain.
    pub fn register(&mut self, bundle_id: BundleId, handler: Arc<dyn BundleHandler>) {
        self.chains.entry(bundle_id).or_default().push(handler);
    }

    /// Puts a handler at the front of every existing chain.
    pub fn prepend_to_all(&mut self, handler: Arc<dyn BundleHandler>) {
        for chain in self.chains.values_mut() {
            chain.insert(0, Arc::clone(&handler));
        }
    }

    pub fn handlers(&self, bundle_id: &BundleId) -> &[Arc<dyn BundleHandler>] {
        self.chains.get(bundle_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn bundles(&self) -> impl Iterator<Item = &BundleId> {
        self.chains.keys()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
