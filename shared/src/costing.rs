//! Stock and weighted-average-cost arithmetic
//!
//! These are the pure formulas behind the product ledger: on-hand stock
//! derived from purchase/sale/cycle totals, and CMUP (coût moyen unitaire
//! pondéré), the weighted-average acquisition cost. Database aggregation
//! lives in the backend services; everything here is deterministic math.

use rust_decimal::Decimal;

/// Number of decimal places persisted for quantities and unit costs
pub const MONEY_SCALE: u32 = 2;

/// Derive on-hand stock from ledger totals
///
/// `stock = purchases − sales − cycle loads/reloads + cycle returns`,
/// floored at zero. A product can never carry negative stock even when the
/// recorded sales exceed recorded purchases.
pub fn stock_balance(
    total_purchased: Decimal,
    total_sold: Decimal,
    total_loaded: Decimal,
    total_returned: Decimal,
) -> Decimal {
    let stock = total_purchased - total_sold - total_loaded + total_returned;
    Decimal::ZERO.max(stock.round_dp(MONEY_SCALE))
}

/// Weighted-average unit cost over the full purchase ledger
///
/// Returns zero when the total quantity is zero, so products with no active
/// purchase history carry a cost of 0 rather than failing on division.
pub fn weighted_average_cost(total_cost: Decimal, total_quantity: Decimal) -> Decimal {
    if total_quantity <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (total_cost / total_quantity).round_dp(MONEY_SCALE)
}

/// O(1) weighted-average update for a single added purchase line
///
/// `current_stock` and `current_cmup` must be the product's persisted values
/// read *before* the new line's stock increment is applied; feeding in the
/// post-increment stock double-counts the new quantity on both sides of the
/// average.
pub fn incremental_average_cost(
    current_stock: Decimal,
    current_cmup: Decimal,
    new_quantity: Decimal,
    new_price: Decimal,
) -> Decimal {
    if current_stock <= Decimal::ZERO {
        // No prior basis to average against: the first unit sets the cost
        return new_price.round_dp(MONEY_SCALE);
    }
    let total_cost = (current_stock * current_cmup) + (new_price * new_quantity);
    let total_quantity = current_stock + new_quantity;
    (total_cost / total_quantity).round_dp(MONEY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_stock_balance_simple() {
        let stock = stock_balance(dec("100"), dec("30"), dec("20"), dec("5"));
        assert_eq!(stock, dec("55"));
    }

    #[test]
    fn test_stock_balance_clamped_at_zero() {
        let stock = stock_balance(dec("10"), dec("25"), dec("0"), dec("0"));
        assert_eq!(stock, Decimal::ZERO);
    }

    #[test]
    fn test_stock_balance_rounds_to_two_decimals() {
        let stock = stock_balance(dec("10.555"), dec("0"), dec("0"), dec("0"));
        assert_eq!(stock, dec("10.56"));
    }

    #[test]
    fn test_weighted_average_cost() {
        // 100 @ 10.00 + 50 @ 16.00 = 1800 over 150 units
        let cmup = weighted_average_cost(dec("1800"), dec("150"));
        assert_eq!(cmup, dec("12.00"));
    }

    #[test]
    fn test_weighted_average_cost_zero_quantity() {
        assert_eq!(weighted_average_cost(dec("500"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_incremental_first_purchase_sets_cost() {
        let cmup = incremental_average_cost(Decimal::ZERO, Decimal::ZERO, dec("100"), dec("10.00"));
        assert_eq!(cmup, dec("10.00"));
    }

    #[test]
    fn test_incremental_blends_with_existing_stock() {
        // 100 on hand at 10.00, buying 50 more at 16.00 => 12.00
        let cmup = incremental_average_cost(dec("100"), dec("10.00"), dec("50"), dec("16.00"));
        assert_eq!(cmup, dec("12.00"));
    }

    #[test]
    fn test_incremental_negative_stock_treated_as_empty() {
        let cmup = incremental_average_cost(dec("-3"), dec("9.00"), dec("10"), dec("14.00"));
        assert_eq!(cmup, dec("14.00"));
    }
}
