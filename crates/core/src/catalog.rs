use rust_decimal::Decimal;

use crate::domain::bundle::{BundleDefinition, BundleId, BundleService, PlanTier};

pub const FINGPT_BUNDLE: &str = "finance_ai_fingpt";
pub const FINROBOT_BUNDLE: &str = "finance_ai_finrobot";
pub const PAYROLL_BUNDLE: &str = "erp_hr_payroll";
pub const MANUFACTURING_BUNDLE: &str = "erp_manufacturing";

pub struct BundleCatalog {
    bundles: Vec<BundleDefinition>,
}

impl Default for BundleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl BundleCatalog {
    pub fn new(bundles: Vec<BundleDefinition>) -> Self {
        Self { bundles }
    }

    /// The purchasable bundles offered on every plan.
    pub fn standard() -> Self {
        Self::new(vec![
            definition(
                FINGPT_BUNDLE,
                "FinGPT Financial Sentiment",
                BundleService::FinGpt,
                &["sentiment_analysis", "batch_sentiment"],
                Decimal::new(2900, 2),
                PlanTier::Professional,
                &[
                    "sentiment_analysis",
                    "financial_nlp",
                    "entity_extraction",
                    "batch_processing",
                    "context_awareness",
                ],
            ),
            definition(
                FINROBOT_BUNDLE,
                "FinRobot Multi-Agent Forecasting",
                BundleService::FinRobot,
                &["financial_forecast", "strategic_analysis"],
                Decimal::new(4900, 2),
                PlanTier::Enterprise,
                &[
                    "multi_agent_forecasting",
                    "strategic_analysis",
                    "cross_departmental_impact",
                    "risk_assessment",
                    "growth_opportunity_identification",
                    "comprehensive_business_analysis",
                ],
            ),
            definition(
                PAYROLL_BUNDLE,
                "ERPNext HR & Payroll",
                BundleService::ErpNext,
                &["process_payroll"],
                Decimal::new(1900, 2),
                PlanTier::Professional,
                &[
                    "multi_region_payroll",
                    "automated_tax_calculation",
                    "hr_management",
                    "compliance_reporting",
                ],
            ),
            definition(
                MANUFACTURING_BUNDLE,
                "ERPNext Manufacturing",
                BundleService::ErpNext,
                &["optimize_bom"],
                Decimal::new(2400, 2),
                PlanTier::Enterprise,
                &[
                    "bom_optimization",
                    "cost_optimization",
                    "supplier_management",
                    "manufacturing_analytics",
                ],
            ),
        ])
    }

    pub fn find(&self, bundle_id: &BundleId) -> Option<&BundleDefinition> {
        self.bundles.iter().find(|bundle| &bundle.id == bundle_id)
    }

    pub fn all(&self) -> &[BundleDefinition] {
        &self.bundles
    }

    pub fn by_service(&self, service: BundleService) -> impl Iterator<Item = &BundleDefinition> {
        self.bundles.iter().filter(move |bundle| bundle.service == service)
    }
}

fn definition(
    id: &str,
    name: &str,
    service: BundleService,
    workflows: &[&str],
    monthly_seat_price: Decimal,
    minimum_tier: PlanTier,
    capabilities: &[&str],
) -> BundleDefinition {
    BundleDefinition {
        id: BundleId(id.to_string()),
        name: name.to_string(),
        service,
        workflows: workflows.iter().map(|workflow| workflow.to_string()).collect(),
        monthly_seat_price,
        minimum_tier,
        capabilities: capabilities.iter().map(|capability| capability.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::bundle::{BundleId, BundleService, PlanTier};

    use super::{BundleCatalog, FINGPT_BUNDLE, MANUFACTURING_BUNDLE};

    #[test]
    fn standard_catalog_resolves_known_bundles() {
        let catalog = BundleCatalog::standard();
        let fingpt = catalog.find(&BundleId(FINGPT_BUNDLE.to_string())).expect("fingpt bundle");

        assert_eq!(fingpt.service, BundleService::FinGpt);
        assert!(fingpt.supports("sentiment_analysis"));
        assert!(!fingpt.supports("optimize_bom"));
        assert!(catalog.find(&BundleId("voice_ai".to_string())).is_none());
    }

    #[test]
    fn erpnext_serves_two_bundles() {
        let catalog = BundleCatalog::standard();
        assert_eq!(catalog.by_service(BundleService::ErpNext).count(), 2);
    }

    #[test]
    fn manufacturing_requires_enterprise() {
        let catalog = BundleCatalog::standard();
        let bundle =
            catalog.find(&BundleId(MANUFACTURING_BUNDLE.to_string())).expect("manufacturing");
        assert!(!bundle.available_on(PlanTier::Professional));
        assert!(bundle.available_on(PlanTier::Enterprise));
    }
}
