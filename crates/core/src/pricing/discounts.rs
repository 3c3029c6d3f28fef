use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bundle::BillingCycle;
use crate::pricing::promo::PromoCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    BillingCycle,
    MultiBundle,
    Volume,
    Promo,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BillingCycle => "billing_cycle",
            Self::MultiBundle => "multi_bundle",
            Self::Volume => "volume",
            Self::Promo => "promo",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub kind: DiscountKind,
    pub label: String,
    pub rate_pct: Decimal,
}

pub fn billing_cycle_discount(cycle: BillingCycle) -> Option<AppliedDiscount> {
    match cycle {
        BillingCycle::Annual => Some(AppliedDiscount {
            kind: DiscountKind::BillingCycle,
            label: "annual billing".to_string(),
            rate_pct: Decimal::from(20),
        }),
        BillingCycle::Monthly => None,
    }
}

pub fn multi_bundle_discount(bundle_count: usize) -> Option<AppliedDiscount> {
    let rate = match bundle_count {
        0 | 1 => return None,
        2 => 5,
        3 => 10,
        _ => 15,
    };
    Some(AppliedDiscount {
        kind: DiscountKind::MultiBundle,
        label: format!("{bundle_count} bundles"),
        rate_pct: Decimal::from(rate),
    })
}

pub fn volume_discount(seats: u32) -> Option<AppliedDiscount> {
    let rate = match seats {
        0..=24 => return None,
        25..=99 => 5,
        100..=499 => 10,
        _ => 15,
    };
    Some(AppliedDiscount {
        kind: DiscountKind::Volume,
        label: format!("{seats} seats"),
        rate_pct: Decimal::from(rate),
    })
}

pub fn promo_discount(promo: &PromoCode) -> AppliedDiscount {
    AppliedDiscount {
        kind: DiscountKind::Promo,
        label: format!("promo {}", promo.code),
        rate_pct: promo.rate_pct,
    }
}

/// Fraction of the subtotal removed when every discount compounds on what the
/// previous ones left.
pub fn compound_fraction(discounts: &[AppliedDiscount]) -> Decimal {
    let remaining = discounts.iter().fold(Decimal::ONE, |remaining, discount| {
        remaining * (Decimal::ONE - discount.rate_pct / Decimal::ONE_HUNDRED)
    });
    Decimal::ONE - remaining
}
