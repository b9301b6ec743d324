use rust_decimal::Decimal;

/// Bounds on the position sizer: a risk fraction of capital and a hard
/// absolute ceiling on position size.
#[derive(Debug, Clone, Copy)]
pub struct SizingConfig {
    pub max_risk_per_trade_percent: Decimal,
    pub max_position_size: Decimal,
    pub max_single_position_percent: Decimal,
}

/// Computes an entry quantity bounded by a max risk fraction of capital and
/// a max absolute position size. Returns zero when no size can be taken
/// within both bounds; callers must abort and cancel the entry in that case.
pub fn calculate_quantity(
    config: &SizingConfig,
    total_equity: Decimal,
    entry_price: Decimal,
    stop_loss: Decimal,
) -> Decimal {
    if entry_price <= Decimal::ZERO || total_equity <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let risk_per_unit = (entry_price - stop_loss).abs();
    if risk_per_unit <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let hundred = Decimal::from(100);
    let risk_budget = total_equity * config.max_risk_per_trade_percent / hundred;
    let risk_bounded_qty = (risk_budget / risk_per_unit).floor();

    let max_notional = total_equity * config.max_single_position_percent / hundred;
    let notional_bounded_qty = (max_notional / entry_price).floor();

    let mut quantity = risk_bounded_qty.min(notional_bounded_qty).min(config.max_position_size);

    if quantity < Decimal::ONE {
        quantity = Decimal::ZERO;
    }

    quantity
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> SizingConfig {
        SizingConfig {
            max_risk_per_trade_percent: dec!(1),
            max_position_size: dec!(1000),
            max_single_position_percent: dec!(20),
        }
    }

    #[test]
    fn quantity_bounded_by_risk_budget() {
        let qty = calculate_quantity(&config(), dec!(100_000), dec!(100), dec!(95));
        // risk budget = 1000, risk per unit = 5 -> 200 units; notional cap = 20000/100=200
        assert_eq!(qty, dec!(200));
    }

    #[test]
    fn zero_risk_per_unit_returns_zero() {
        let qty = calculate_quantity(&config(), dec!(100_000), dec!(100), dec!(100));
        assert_eq!(qty, Decimal::ZERO);
    }

    #[test]
    fn quantity_never_exceeds_max_position_size() {
        let mut cfg = config();
        cfg.max_risk_per_trade_percent = dec!(50);
        cfg.max_single_position_percent = dec!(100);
        let qty = calculate_quantity(&cfg, dec!(1_000_000), dec!(10), dec!(9));
        assert_eq!(qty, dec!(1000));
    }

    #[test]
    fn sub_one_quantity_is_zero_not_fractional() {
        let qty = calculate_quantity(&config(), dec!(100), dec!(100), dec!(50));
        assert_eq!(qty, Decimal::ZERO);
    }
}
