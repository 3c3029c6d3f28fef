use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bundles::{exceeds_input_range, BundleError, MAX_INPUT_AMOUNT};
use crate::money::round_currency;

pub const MAX_COMPONENTS: usize = 500;
pub const DEFAULT_ANNUAL_VOLUME: u32 = 1_000;

const HIGH_COST_SHARE_PCT: i64 = 15;
const DESIGN_REVIEW_SHARE_PCT: i64 = 5;
const LONG_LEAD_TIME_DAYS: u32 = 30;
const TOP_COMPONENTS: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomComponent {
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_cost: Decimal,
    #[serde(default)]
    pub weight: Decimal,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub lead_time: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomRequest {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub annual_volume: Option<u32>,
    #[serde(default)]
    pub components: Vec<BomComponent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    pub part_number: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub weight: Decimal,
    pub supplier: String,
    pub lead_time: u32,
    pub cost_percentage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomAnalysis {
    pub total_components: usize,
    pub total_cost: Decimal,
    pub total_weight: Decimal,
    pub component_breakdown: Vec<ComponentAnalysis>,
    pub top_cost_components: Vec<ComponentAnalysis>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostOptimization {
    pub component: String,
    pub current_cost: Decimal,
    pub optimization: String,
    pub potential_savings: Decimal,
    pub implementation_effort: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOptimization {
    pub component: String,
    pub issue: String,
    pub recommendation: String,
    pub risk_reduction: String,
    pub cost_impact: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignOptimization {
    pub component: String,
    pub current_quantity: Decimal,
    pub optimization: String,
    pub potential_reduction: Decimal,
    pub savings: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SustainabilityOpportunity {
    pub opportunity: String,
    pub components_affected: u32,
    pub environmental_impact: String,
    pub cost_impact: String,
    pub implementation_timeline: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomOptimizations {
    pub cost_optimizations: Vec<CostOptimization>,
    pub supplier_optimizations: Vec<SupplierOptimization>,
    pub design_optimizations: Vec<DesignOptimization>,
    pub sustainability_optimizations: Vec<SustainabilityOpportunity>,
    pub high_priority: Vec<String>,
    pub medium_priority: Vec<String>,
    pub low_priority: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsBreakdown {
    pub cost_negotiations: Decimal,
    pub design_optimizations: Decimal,
    pub supplier_optimizations: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsAnalysis {
    pub unit_cost_reduction: Decimal,
    pub annual_volume: u32,
    pub total_annual_savings: Decimal,
    pub savings_breakdown: SavingsBreakdown,
    pub payback_period: String,
    pub roi_projection: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BomOptimization {
    pub product_name: String,
    pub bom_version: String,
    pub current_bom: BomAnalysis,
    pub optimizations: BomOptimizations,
    pub savings_analysis: SavingsAnalysis,
    pub risk_assessment: Value,
    pub recommendations: Value,
}

#[derive(Clone, Debug, Default)]
pub struct BomOptimizer;

impl BomOptimizer {
    pub fn optimize_bom(&self, request: &BomRequest) -> Result<BomOptimization, BundleError> {
        validate(request)?;

        let analysis = analyze(&request.components);
        let (optimizations, unit_savings) = optimizations(&analysis);
        let savings = savings(
            request.annual_volume.unwrap_or(DEFAULT_ANNUAL_VOLUME),
            unit_savings,
        )?;
        let risk_assessment = risk_assessment();
        let recommendations = json!({
            "priority_changes": optimizations.high_priority,
            "implementation_timeline": "4-8 weeks",
            "expected_savings": savings.total_annual_savings,
            "risk_mitigation": risk_assessment["mitigation_strategies"],
        });

        tracing::info!(
            event_name = "bundle.erpnext.bom_optimized",
            product = %request.product_name,
            components = analysis.total_components,
            "bill of materials optimized"
        );

        Ok(BomOptimization {
            product_name: request.product_name.clone(),
            bom_version: request.version.clone().unwrap_or_else(|| "1.0".to_string()),
            current_bom: analysis,
            optimizations,
            savings_analysis: savings,
            risk_assessment,
            recommendations,
        })
    }

    pub fn capabilities(&self) -> Value {
        json!({
            "service": "erpnext",
            "capabilities": [
                "bom_optimization",
                "cost_optimization",
                "supplier_management",
                "manufacturing_analytics"
            ],
            "manufacturing_optimization": ["cost", "quality", "sustainability", "lead_time"],
            "max_bom_components": MAX_COMPONENTS,
        })
    }
}

fn validate(request: &BomRequest) -> Result<(), BundleError> {
    let mut errors = Vec::new();
    if request.product_name.trim().is_empty() {
        errors.push("Product name is required".to_string());
    }
    if request.components.is_empty() {
        errors.push("Components list is required".to_string());
    }
    if request.components.len() > MAX_COMPONENTS {
        errors.push(format!("BOM exceeds {MAX_COMPONENTS} components"));
    }
    for (index, component) in request.components.iter().enumerate() {
        if component.part_number.trim().is_empty() {
            errors.push(format!("Component {}: Part number is required", index + 1));
        }
        if component.quantity <= Decimal::ZERO {
            errors.push(format!("Component {}: Valid quantity is required", index + 1));
        }
        let amounts = [
            ("quantity", component.quantity),
            ("unit_cost", component.unit_cost),
            ("weight", component.weight),
        ];
        for (field, _) in amounts.into_iter().filter(|(_, amount)| exceeds_input_range(*amount)) {
            errors.push(format!(
                "Component {}: {field} exceeds the supported range of {MAX_INPUT_AMOUNT}",
                index + 1
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BundleError::Validation(errors))
    }
}

fn analyze(components: &[BomComponent]) -> BomAnalysis {
    let mut breakdown: Vec<ComponentAnalysis> = components
        .iter()
        .map(|component| ComponentAnalysis {
            part_number: component.part_number.clone(),
            description: component.description.clone(),
            quantity: component.quantity,
            unit_cost: component.unit_cost,
            total_cost: round_currency(component.unit_cost * component.quantity),
            weight: component.weight * component.quantity,
            supplier: component.supplier.clone().unwrap_or_else(|| "Unknown".to_string()),
            lead_time: component.lead_time,
            cost_percentage: Decimal::ZERO,
        })
        .collect();

    let total_cost: Decimal = breakdown.iter().map(|item| item.total_cost).sum();
    let total_weight: Decimal = breakdown.iter().map(|item| item.weight).sum();
    if total_cost > Decimal::ZERO {
        for item in &mut breakdown {
            item.cost_percentage =
                (item.total_cost / total_cost * Decimal::ONE_HUNDRED).round_dp(2);
        }
    }

    let mut top_cost_components = breakdown.clone();
    top_cost_components.sort_by(|left, right| right.total_cost.cmp(&left.total_cost));
    top_cost_components.truncate(TOP_COMPONENTS);

    BomAnalysis {
        total_components: breakdown.len(),
        total_cost: round_currency(total_cost),
        total_weight: round_currency(total_weight),
        component_breakdown: breakdown,
        top_cost_components,
    }
}

/// Returns the recommendations plus the unrounded per-unit savings they add up to.
fn optimizations(analysis: &BomAnalysis) -> (BomOptimizations, (Decimal, Decimal)) {
    let mut result = BomOptimizations::default();
    let mut cost_savings = Decimal::ZERO;
    let mut design_savings = Decimal::ZERO;

    for component in &analysis.component_breakdown {
        if component.cost_percentage > Decimal::from(HIGH_COST_SHARE_PCT) {
            let saving = component.total_cost * Decimal::new(12, 2);
            cost_savings += saving;
            result.cost_optimizations.push(CostOptimization {
                component: component.part_number.clone(),
                current_cost: component.total_cost,
                optimization: "Alternative supplier negotiation".to_string(),
                potential_savings: round_currency(saving),
                implementation_effort: "Medium".to_string(),
            });
            result.high_priority.push(format!("Negotiate pricing for {}", component.part_number));
        }

        if component.lead_time > LONG_LEAD_TIME_DAYS {
            result.supplier_optimizations.push(SupplierOptimization {
                component: component.part_number.clone(),
                issue: "Long lead time".to_string(),
                recommendation: "Identify backup suppliers".to_string(),
                risk_reduction: "High".to_string(),
                cost_impact: round_currency(component.total_cost * Decimal::new(5, 2)),
            });
            result.medium_priority.push(format!("Backup supplier for {}", component.part_number));
        }

        if component.quantity > Decimal::ONE
            && component.cost_percentage > Decimal::from(DESIGN_REVIEW_SHARE_PCT)
        {
            let reduction = (component.quantity * Decimal::new(1, 1)).floor().max(Decimal::ONE);
            let saving = component.unit_cost * reduction;
            design_savings += saving;
            result.design_optimizations.push(DesignOptimization {
                component: component.part_number.clone(),
                current_quantity: component.quantity,
                optimization: "Design consolidation opportunity".to_string(),
                potential_reduction: reduction,
                savings: round_currency(saving),
            });
            result.low_priority.push(format!("Design review for {}", component.part_number));
        }
    }

    result.sustainability_optimizations = vec![
        SustainabilityOpportunity {
            opportunity: "Recycled materials substitution".to_string(),
            components_affected: 3,
            environmental_impact: "Medium reduction in carbon footprint".to_string(),
            cost_impact: "Neutral to 5% increase".to_string(),
            implementation_timeline: "3-6 months".to_string(),
        },
        SustainabilityOpportunity {
            opportunity: "Local supplier preference".to_string(),
            components_affected: 5,
            environmental_impact: "Reduced transportation emissions".to_string(),
            cost_impact: "2-8% cost variation".to_string(),
            implementation_timeline: "2-4 months".to_string(),
        },
    ];

    (result, (cost_savings, design_savings))
}

/// Annual volume is unbounded, so the per-year figures use checked arithmetic.
fn savings(
    annual_volume: u32,
    (cost_savings, design_savings): (Decimal, Decimal),
) -> Result<SavingsAnalysis, BundleError> {
    let volume = Decimal::from(annual_volume);
    let annualize = |amount: Decimal| {
        amount.checked_mul(volume).ok_or_else(|| {
            BundleError::InvalidInput(format!(
                "Annual savings for a volume of {annual_volume} exceed the supported range"
            ))
        })
    };
    let unit_savings = cost_savings + design_savings;
    let annual_savings = annualize(unit_savings)?;

    Ok(SavingsAnalysis {
        unit_cost_reduction: round_currency(unit_savings),
        annual_volume,
        total_annual_savings: round_currency(annual_savings),
        savings_breakdown: SavingsBreakdown {
            cost_negotiations: round_currency(annualize(cost_savings)?),
            design_optimizations: round_currency(annualize(design_savings)?),
            supplier_optimizations: round_currency(annual_savings * Decimal::new(5, 2)),
        },
        payback_period: "6-12 months".to_string(),
        roi_projection: "15-25%".to_string(),
    })
}

fn risk_assessment() -> Value {
    json!({
        "risk_factors": [
            {
                "risk": "Supplier reliability",
                "probability": "Medium",
                "impact": "High",
                "mitigation": "Maintain backup suppliers and safety stock"
            },
            {
                "risk": "Quality degradation",
                "probability": "Low",
                "impact": "High",
                "mitigation": "Implement rigorous testing protocols"
            },
            {
                "risk": "Supply chain disruption",
                "probability": "Medium",
                "impact": "Medium",
                "mitigation": "Diversify supplier base and maintain inventory buffers"
            }
        ],
        "overall_risk_rating": "Medium",
        "mitigation_strategies": [
            "Phase implementation over 3-6 months",
            "Pilot test with small batches",
            "Maintain dual sourcing for critical components",
            "Establish quality control checkpoints"
        ],
        "monitoring_requirements": [
            "Monthly supplier performance reviews",
            "Quality metrics tracking",
            "Cost variance analysis",
            "Lead time monitoring"
        ]
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::bundles::BundleError;

    use super::{BomComponent, BomOptimizer, BomRequest};

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn component(part: &str, quantity: &str, unit_cost: &str, weight: &str, lead_time: u32) -> BomComponent {
        BomComponent {
            part_number: part.to_string(),
            description: String::new(),
            quantity: dec(quantity),
            unit_cost: dec(unit_cost),
            weight: dec(weight),
            supplier: None,
            lead_time,
        }
    }

    fn widget() -> BomRequest {
        BomRequest {
            product_name: "Advanced Widget Pro".to_string(),
            version: Some("2.1".to_string()),
            annual_volume: Some(5_000),
            components: vec![
                component("COMP-001", "1", "45.50", "2.1", 45),
                component("COMP-002", "1", "67.80", "0.3", 21),
                component("COMP-003", "8", "0.12", "0.01", 7),
            ],
        }
    }

    #[test]
    fn analysis_totals_and_ranks_components() {
        let result = BomOptimizer.optimize_bom(&widget()).expect("optimized");
        let bom = &result.current_bom;

        assert_eq!(bom.total_components, 3);
        assert_eq!(bom.total_cost, dec("114.26"));
        assert_eq!(bom.total_weight, dec("2.48"));
        assert_eq!(bom.component_breakdown[1].cost_percentage, dec("59.34"));
        let ranked: Vec<&str> =
            bom.top_cost_components.iter().map(|item| item.part_number.as_str()).collect();
        assert_eq!(ranked, vec!["COMP-002", "COMP-001", "COMP-003"]);
        assert_eq!(result.bom_version, "2.1");
    }

    #[test]
    fn expensive_and_slow_components_get_recommendations() {
        let result = BomOptimizer.optimize_bom(&widget()).expect("optimized");
        let optimizations = &result.optimizations;

        assert_eq!(optimizations.cost_optimizations.len(), 2);
        assert_eq!(optimizations.cost_optimizations[1].potential_savings, dec("8.14"));
        assert_eq!(optimizations.supplier_optimizations.len(), 1);
        assert_eq!(optimizations.supplier_optimizations[0].cost_impact, dec("2.28"));
        assert!(optimizations.design_optimizations.is_empty());
        assert_eq!(optimizations.medium_priority, vec!["Backup supplier for COMP-001"]);
        assert_eq!(optimizations.sustainability_optimizations.len(), 2);

        let savings = &result.savings_analysis;
        assert_eq!(savings.unit_cost_reduction, dec("13.60"));
        assert_eq!(savings.total_annual_savings, dec("67980.00"));
        assert_eq!(savings.savings_breakdown.supplier_optimizations, dec("3399.00"));
        assert_eq!(result.recommendations["implementation_timeline"], "4-8 weeks");
    }

    #[test]
    fn bulk_components_trigger_design_review() {
        let request = BomRequest {
            product_name: "Rack".to_string(),
            components: vec![
                component("BOLT", "25", "2.00", "0.1", 5),
                component("FRAME", "1", "100.00", "12", 10),
            ],
            ..BomRequest::default()
        };
        let result = BomOptimizer.optimize_bom(&request).expect("optimized");
        let design = &result.optimizations.design_optimizations;

        // bolts: 50 of 150 total cost
        assert_eq!(design.len(), 1);
        assert_eq!(design[0].potential_reduction, Decimal::from(2));
        assert_eq!(design[0].savings, dec("4.00"));
        assert_eq!(result.savings_analysis.annual_volume, 1_000);
        assert_eq!(result.bom_version, "1.0");
    }

    #[test]
    fn oversized_quantities_and_costs_are_rejected() {
        let request = BomRequest {
            product_name: "Gearbox".to_string(),
            components: vec![
                component("SHAFT", "70000000000000000000000000000", "2", "0.5", 10),
                component("HOUSING", "1", "-1000000000001", "4", 10),
            ],
            ..BomRequest::default()
        };
        let error = BomOptimizer.optimize_bom(&request).expect_err("out of range bom");
        assert_eq!(
            error,
            BundleError::Validation(vec![
                "Component 1: quantity exceeds the supported range of 1000000000000".to_string(),
                "Component 2: unit_cost exceeds the supported range of 1000000000000".to_string(),
            ])
        );
    }

    #[test]
    fn annual_savings_overflow_is_reported_not_raised() {
        let request = BomRequest {
            product_name: "Turbine".to_string(),
            annual_volume: Some(u32::MAX),
            components: vec![
                component("ROTOR", "1000000000000", "1000000000000", "1", 5),
                component("STATOR", "1000000000000", "1000000000000", "1", 5),
            ],
            ..BomRequest::default()
        };
        let error = BomOptimizer.optimize_bom(&request).expect_err("savings overflow");
        assert_eq!(error.error_code(), "invalid_input");

        let modest = BomRequest { annual_volume: Some(1_000), ..request };
        assert!(BomOptimizer.optimize_bom(&modest).is_ok());
    }

    #[test]
    fn validation_reports_each_bad_component() {
        let request = BomRequest {
            product_name: " ".to_string(),
            components: vec![component("", "0", "1", "0", 0)],
            ..BomRequest::default()
        };
        let error = BomOptimizer.optimize_bom(&request).expect_err("invalid bom");
        assert_eq!(
            error,
            BundleError::Validation(vec![
                "Product name is required".to_string(),
                "Component 1: Part number is required".to_string(),
                "Component 1: Valid quantity is required".to_string(),
            ])
        );
    }
}
