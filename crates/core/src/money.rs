use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents, half away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn percent_of(value: Decimal, pct: Decimal) -> Decimal {
    value * pct / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{percent_of, round_currency};

    #[test]
    fn rounds_midpoint_away_from_zero() {
        assert_eq!(round_currency(Decimal::new(10_005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_currency(Decimal::new(-10_005, 3)), Decimal::new(-1001, 2));
        assert_eq!(round_currency(Decimal::new(10_004, 3)), Decimal::new(1000, 2));
    }

    #[test]
    fn percent_of_scales_by_hundred() {
        assert_eq!(percent_of(Decimal::from(200), Decimal::from(15)), Decimal::from(30));
    }
}
