use std::str::FromStr;

use coreflow_core::{
    BillingCycle, BundleId, DeterministicPricingEngine, PlanTier, PricingEngine, PricingRequest,
};
use rust_decimal::Decimal;

use crate::commands::{load_config, to_data, CommandResult, EXIT_INVALID_INPUT};

#[derive(Clone, Debug, Default)]
pub struct PriceArgs {
    pub tier: String,
    pub bundles: Vec<String>,
    pub seats: u32,
    pub annual: bool,
    pub promo: Option<String>,
    pub tax_rate: Option<String>,
}

pub fn run(args: PriceArgs) -> CommandResult {
    let config = match load_config("price") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let request = match build_request(args) {
        Ok(request) => request,
        Err(message) => {
            return CommandResult::failure("price", "invalid_input", message, EXIT_INVALID_INPUT);
        }
    };

    let engine = DeterministicPricingEngine::with_policy(config.pricing.policy());
    match engine.price(&request) {
        Ok(result) => CommandResult::success_with(
            "price",
            format!("total {} {}", result.total, result.currency),
            to_data(&result),
        ),
        Err(error) => CommandResult::failure(
            "price",
            error.error_code(),
            error.to_string(),
            EXIT_INVALID_INPUT,
        ),
    }
}

fn build_request(args: PriceArgs) -> Result<PricingRequest, String> {
    let tier = PlanTier::from_str(&args.tier).map_err(|error| error.to_string())?;
    let tax_rate_pct = match args.tax_rate.as_deref() {
        Some(raw) => Decimal::from_str(raw.trim())
            .map_err(|error| format!("invalid --tax-rate `{raw}`: {error}"))?,
        None => Decimal::ZERO,
    };

    Ok(PricingRequest {
        tier,
        bundles: args.bundles.iter().map(|bundle| BundleId::from(bundle.trim())).collect(),
        seats: args.seats,
        billing_cycle: if args.annual { BillingCycle::Annual } else { BillingCycle::Monthly },
        promo_code: args.promo,
        tax_rate_pct,
        as_of: None,
    })
}
