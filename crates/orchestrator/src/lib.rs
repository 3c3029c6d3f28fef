//! Bundle orchestration: routes tenant workflow requests to ordered handler
//! chains after an entitlement check, falling back to a canned response when
//! no handler can serve the request.

pub mod entitlement;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod runtime;

pub use entitlement::{EntitlementDecision, EntitlementPolicy};
pub use error::OrchestrationError;
pub use handler::{BundleHandler, HandlerContext, HandlerHealth, HealthStatus};
pub use handlers::{ErpNextHandler, FinGptHandler, FinRobotHandler, RemoteBundleHandler};
pub use registry::BundleRegistry;
pub use runtime::{
    OrchestrationRequest, OrchestrationResult, Orchestrator, OrchestratorHealth,
    OrchestratorSettings,
};
