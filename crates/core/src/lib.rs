pub mod audit;
pub mod bundles;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod money;
pub mod pricing;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use bundles::bom::{BomOptimization, BomOptimizer, BomRequest};
pub use bundles::forecast::{ForecastEngine, ForecastInput, ForecastReport, ForecastType};
pub use bundles::payroll::{PayrollEngine, PayrollRegion, PayrollRequest, PayrollSummary};
pub use bundles::sentiment::{SentimentAnalysis, SentimentAnalyzer, SentimentContext};
pub use bundles::BundleError;
pub use catalog::BundleCatalog;
pub use domain::bundle::{BillingCycle, BundleDefinition, BundleId, BundleService, PlanTier};
pub use domain::run::{OrchestrationRun, OrchestrationStatus, RunId};
pub use domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};
pub use domain::tenant::TenantId;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::{
    DeterministicPricingEngine, PricingEngine, PricingError, PricingPolicy, PricingRequest,
    PricingResult,
};
