use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bundle::PlanTier;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub rate_pct: Decimal,
    pub minimum_tier: PlanTier,
    pub valid_until: Option<NaiveDate>,
}

impl PromoCode {
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        self.valid_until.is_some_and(|valid_until| as_of > valid_until)
    }
}

pub fn standard_promo_codes() -> Vec<PromoCode> {
    vec![
        promo("LAUNCH20", Decimal::from(20), PlanTier::Starter, NaiveDate::from_ymd_opt(2026, 12, 31)),
        promo("NONPROFIT30", Decimal::from(30), PlanTier::Starter, None),
        promo("PARTNER15", Decimal::from(15), PlanTier::Professional, None),
        promo("ENTERPRISE10", Decimal::from(10), PlanTier::Enterprise, None),
    ]
}

/// Codes match case-insensitively after trimming.
pub fn find_promo_code(code: &str) -> Option<PromoCode> {
    let normalized = code.trim().to_ascii_uppercase();
    standard_promo_codes().into_iter().find(|promo| promo.code == normalized)
}

fn promo(
    code: &str,
    rate_pct: Decimal,
    minimum_tier: PlanTier,
    valid_until: Option<NaiveDate>,
) -> PromoCode {
    PromoCode { code: code.to_string(), rate_pct, minimum_tier, valid_until }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::find_promo_code;

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let promo = find_promo_code("  launch20 ").expect("launch promo");
        assert_eq!(promo.code, "LAUNCH20");
        assert!(find_promo_code("FREEBIE").is_none());
    }

    #[test]
    fn launch_code_expires_after_year_end() {
        let promo = find_promo_code("LAUNCH20").expect("launch promo");
        let before = NaiveDate::from_ymd_opt(2026, 12, 31).expect("date");
        let after = NaiveDate::from_ymd_opt(2027, 1, 1).expect("date");

        assert!(!promo.is_expired(before));
        assert!(promo.is_expired(after));
    }
}
