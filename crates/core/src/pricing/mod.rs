pub mod discounts;
pub mod promo;

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::BundleCatalog;
use crate::domain::bundle::{BillingCycle, BundleId, PlanTier};
use crate::money::{percent_of, round_currency};

use self::discounts::{
    billing_cycle_discount, compound_fraction, multi_bundle_discount, promo_discount,
    volume_discount, AppliedDiscount,
};
use self::promo::find_promo_code;

pub const MAX_SEATS: u32 = 10_000;
pub const MAX_TAX_RATE_PCT: i64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub tier: PlanTier,
    pub bundles: Vec<BundleId>,
    pub seats: u32,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub tax_rate_pct: Decimal,
    /// Date promo validity is checked against. Defaults to today (UTC).
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("seat count {0} is outside 1..=10000")]
    InvalidSeatCount(u32),
    #[error("unknown bundle `{0}`")]
    UnknownBundle(BundleId),
    #[error("bundle `{0}` requested more than once")]
    DuplicateBundle(BundleId),
    #[error("bundle `{bundle}` requires the {required:?} tier")]
    TierTooLow { bundle: BundleId, required: PlanTier },
    #[error("tax rate {0}% is outside 0..=30")]
    InvalidTaxRate(Decimal),
    #[error("unknown promo code `{0}`")]
    UnknownPromoCode(String),
    #[error("promo code `{0}` has expired")]
    ExpiredPromoCode(String),
    #[error("promo code `{code}` requires the {required:?} tier")]
    PromoNotApplicable { code: String, required: PlanTier },
}

impl PricingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSeatCount(_) => "invalid_seat_count",
            Self::UnknownBundle(_) => "unknown_bundle",
            Self::DuplicateBundle(_) => "duplicate_bundle",
            Self::TierTooLow { .. } => "tier_too_low",
            Self::InvalidTaxRate(_) => "invalid_tax_rate",
            Self::UnknownPromoCode(_) => "unknown_promo_code",
            Self::ExpiredPromoCode(_) => "expired_promo_code",
            Self::PromoNotApplicable { .. } => "promo_not_applicable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub currency: String,
    pub steps: Vec<PricingTraceStep>,
}

impl PricingTrace {
    fn push(&mut self, stage: impl Into<String>, detail: impl Into<String>, amount: Decimal) {
        self.steps.push(PricingTraceStep {
            stage: stage.into(),
            detail: detail.into(),
            amount,
        });
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingLineItem {
    pub description: String,
    pub bundle_id: Option<BundleId>,
    pub unit_price: Decimal,
    pub seats: u32,
    pub months: u32,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub currency: String,
    pub line_items: Vec<PricingLineItem>,
    pub subtotal: Decimal,
    pub discounts: Vec<AppliedDiscount>,
    pub effective_discount_pct: Decimal,
    pub discount_capped: bool,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub monthly_equivalent: Decimal,
    pub trace: PricingTrace,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingPolicy {
    pub currency: String,
    pub max_combined_discount_pct: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { currency: "USD".to_string(), max_combined_discount_pct: Decimal::from(45) }
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, request: &PricingRequest) -> Result<PricingResult, PricingError>;
}

#[derive(Default)]
pub struct DeterministicPricingEngine {
    policy: PricingPolicy,
    catalog: BundleCatalog,
}

impl DeterministicPricingEngine {
    pub fn new(policy: PricingPolicy, catalog: BundleCatalog) -> Self {
        Self { policy, catalog }
    }

    pub fn with_policy(policy: PricingPolicy) -> Self {
        Self::new(policy, BundleCatalog::standard())
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    fn line_items(&self, request: &PricingRequest) -> Result<Vec<PricingLineItem>, PricingError> {
        let months = request.billing_cycle.months();
        let mut seen = HashSet::new();
        let mut items = vec![line_item(
            format!("{} platform", request.tier.as_str()),
            None,
            request.tier.seat_price(),
            request.seats,
            months,
        )];

        for bundle_id in &request.bundles {
            let bundle = self
                .catalog
                .find(bundle_id)
                .ok_or_else(|| PricingError::UnknownBundle(bundle_id.clone()))?;
            if !seen.insert(bundle_id.clone()) {
                return Err(PricingError::DuplicateBundle(bundle_id.clone()));
            }
            if !bundle.available_on(request.tier) {
                return Err(PricingError::TierTooLow {
                    bundle: bundle_id.clone(),
                    required: bundle.minimum_tier,
                });
            }
            items.push(line_item(
                bundle.name.clone(),
                Some(bundle_id.clone()),
                bundle.monthly_seat_price,
                request.seats,
                months,
            ));
        }

        Ok(items)
    }

    fn discounts(&self, request: &PricingRequest) -> Result<Vec<AppliedDiscount>, PricingError> {
        let mut discounts = Vec::new();
        discounts.extend(billing_cycle_discount(request.billing_cycle));
        discounts.extend(multi_bundle_discount(request.bundles.len()));
        discounts.extend(volume_discount(request.seats));

        if let Some(raw_code) = request.promo_code.as_deref().filter(|code| !code.trim().is_empty())
        {
            let promo = find_promo_code(raw_code)
                .ok_or_else(|| PricingError::UnknownPromoCode(raw_code.trim().to_string()))?;
            let as_of = request.as_of.unwrap_or_else(|| Utc::now().date_naive());
            if promo.is_expired(as_of) {
                return Err(PricingError::ExpiredPromoCode(promo.code));
            }
            if request.tier < promo.minimum_tier {
                return Err(PricingError::PromoNotApplicable {
                    code: promo.code,
                    required: promo.minimum_tier,
                });
            }
            discounts.push(promo_discount(&promo));
        }

        Ok(discounts)
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, request: &PricingRequest) -> Result<PricingResult, PricingError> {
        if request.seats == 0 || request.seats > MAX_SEATS {
            return Err(PricingError::InvalidSeatCount(request.seats));
        }
        if request.tax_rate_pct < Decimal::ZERO
            || request.tax_rate_pct > Decimal::from(MAX_TAX_RATE_PCT)
        {
            return Err(PricingError::InvalidTaxRate(request.tax_rate_pct));
        }

        let line_items = self.line_items(request)?;
        let discounts = self.discounts(request)?;
        let months = Decimal::from(request.billing_cycle.months());

        let mut trace = PricingTrace { currency: self.policy.currency.clone(), steps: Vec::new() };
        for item in &line_items {
            trace.push(
                "line_item",
                format!("{} x {} seats x {} months", item.description, item.seats, item.months),
                item.amount,
            );
        }

        let subtotal: Decimal = line_items.iter().map(|item| item.amount).sum();
        trace.push("subtotal", "sum(unit_price * seats * months)", subtotal);

        for discount in &discounts {
            trace.push(
                format!("discount.{}", discount.kind.as_str()),
                format!("{} ({}%)", discount.label, discount.rate_pct.normalize()),
                discount.rate_pct,
            );
        }

        let combined = compound_fraction(&discounts);
        let cap = self.policy.max_combined_discount_pct / Decimal::ONE_HUNDRED;
        let discount_capped = combined > cap;
        let effective = if discount_capped { cap } else { combined };
        let effective_discount_pct = (effective * Decimal::ONE_HUNDRED).round_dp(4).normalize();
        if discount_capped {
            trace.push(
                "discount.cap",
                format!(
                    "combined {}% capped at {}%",
                    (combined * Decimal::ONE_HUNDRED).round_dp(4).normalize(),
                    self.policy.max_combined_discount_pct.normalize()
                ),
                effective_discount_pct,
            );
        }

        let discount_total = round_currency(subtotal * effective);
        trace.push(
            "discount_total",
            format!("subtotal * {effective_discount_pct}%"),
            discount_total,
        );

        let taxable = subtotal - discount_total;
        let tax_total = round_currency(percent_of(taxable, request.tax_rate_pct));
        trace.push("tax", format!("taxable * {}%", request.tax_rate_pct.normalize()), tax_total);

        let total = taxable + tax_total;
        trace.push("total", "subtotal - discount_total + tax_total", total);

        let monthly_equivalent = round_currency(total / months);
        trace.push("monthly_equivalent", "total / cycle months", monthly_equivalent);

        tracing::debug!(
            event_name = "pricing.quote.computed",
            tier = request.tier.as_str(),
            seats = request.seats,
            bundle_count = request.bundles.len(),
            discount_capped,
            "subscription priced"
        );

        Ok(PricingResult {
            currency: self.policy.currency.clone(),
            line_items,
            subtotal,
            discounts,
            effective_discount_pct,
            discount_capped,
            discount_total,
            tax_total,
            total,
            monthly_equivalent,
            trace,
        })
    }
}

fn line_item(
    description: String,
    bundle_id: Option<BundleId>,
    unit_price: Decimal,
    seats: u32,
    months: u32,
) -> PricingLineItem {
    PricingLineItem {
        description,
        bundle_id,
        unit_price,
        seats,
        months,
        amount: unit_price * Decimal::from(seats) * Decimal::from(months),
    }
}
