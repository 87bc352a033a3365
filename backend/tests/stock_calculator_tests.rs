//! Stock derivation tests
//!
//! Exercises the ledger-to-stock formula: purchases in, sales and cycle
//! loads out, cycle returns back in, floored at zero, with soft-deleted
//! rows excluded from every ledger type.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::stock_balance;
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A ledger row as the aggregation queries see it: a quantity plus the
/// combined row/parent tombstone state.
#[derive(Debug, Clone, Copy)]
struct LedgerRow {
    quantity: Decimal,
    active: bool,
}

fn row(quantity: &str, active: bool) -> LedgerRow {
    LedgerRow {
        quantity: dec(quantity),
        active,
    }
}

/// Sum of active rows, the way the SQL aggregations filter tombstones
fn active_sum(rows: &[LedgerRow]) -> Decimal {
    rows.iter()
        .filter(|r| r.active)
        .map(|r| r.quantity)
        .sum()
}

fn derive_stock(
    purchases: &[LedgerRow],
    sales: &[LedgerRow],
    loads: &[LedgerRow],
    returns: &[LedgerRow],
) -> Decimal {
    stock_balance(
        active_sum(purchases),
        active_sum(sales),
        active_sum(loads),
        active_sum(returns),
    )
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_stock_from_all_ledger_types() {
        let purchases = [row("100", true), row("50", true)];
        let sales = [row("30", true)];
        let loads = [row("40", true)];
        let returns = [row("10", true)];

        // 150 - 30 - 40 + 10 = 90
        let stock = derive_stock(&purchases, &sales, &loads, &returns);
        assert_eq!(stock, dec("90"));
    }

    #[test]
    fn test_empty_ledger_yields_zero() {
        let stock = derive_stock(&[], &[], &[], &[]);
        assert_eq!(stock, Decimal::ZERO);
    }

    #[test]
    fn test_stock_never_negative() {
        // Sales exceed recorded purchases: clamped, not negative
        let purchases = [row("10", true)];
        let sales = [row("25", true)];

        let stock = derive_stock(&purchases, &sales, &[], &[]);
        assert_eq!(stock, Decimal::ZERO);
    }

    #[test]
    fn test_soft_deleted_purchase_excluded() {
        let purchases = [row("100", true), row("100", false)];

        let stock = derive_stock(&purchases, &[], &[], &[]);
        assert_eq!(stock, dec("100"));
    }

    /// Soft-delete exclusion applies uniformly: a tombstoned sale or cycle
    /// movement contributes nothing either.
    #[test]
    fn test_soft_deleted_sale_and_movement_excluded() {
        let purchases = [row("100", true)];
        let sales = [row("60", false)];
        let loads = [row("30", false)];
        let returns = [row("15", false)];

        let stock = derive_stock(&purchases, &sales, &loads, &returns);
        assert_eq!(stock, dec("100"));
    }

    #[test]
    fn test_line_of_deleted_invoice_excluded() {
        // A live line whose parent invoice is soft-deleted is inactive for
        // the aggregation, exactly like a tombstoned line.
        let parent_deleted = true;
        let line_deleted = false;
        let active = !parent_deleted && !line_deleted;

        let purchases = [row("100", active), row("40", true)];
        let stock = derive_stock(&purchases, &[], &[], &[]);
        assert_eq!(stock, dec("40"));
    }

    #[test]
    fn test_stock_rounds_to_two_decimals() {
        let purchases = [row("10.005", true)];
        let stock = derive_stock(&purchases, &[], &[], &[]);
        assert_eq!(stock, dec("10.01"));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let purchases = [row("80", true), row("20", true)];
        let sales = [row("12.5", true)];

        let first = derive_stock(&purchases, &sales, &[], &[]);
        let second = derive_stock(&purchases, &sales, &[], &[]);
        assert_eq!(first, second);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating valid quantities (positive decimals)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 1000.0
    }

    /// Strategy for generating ledger rows with a tombstone state
    fn row_strategy() -> impl Strategy<Value = LedgerRow> {
        (quantity_strategy(), any::<bool>())
            .prop_map(|(quantity, active)| LedgerRow { quantity, active })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Stock is never negative, whatever the ledger history
        #[test]
        fn prop_stock_non_negative(
            purchases in prop::collection::vec(row_strategy(), 0..10),
            sales in prop::collection::vec(row_strategy(), 0..10),
            loads in prop::collection::vec(row_strategy(), 0..10),
            returns in prop::collection::vec(row_strategy(), 0..10)
        ) {
            let stock = derive_stock(&purchases, &sales, &loads, &returns);
            prop_assert!(stock >= Decimal::ZERO);
        }

        /// When inflows cover outflows the formula is plain arithmetic
        #[test]
        fn prop_stock_matches_arithmetic_when_covered(
            purchases in prop::collection::vec(quantity_strategy(), 1..10),
            sales in prop::collection::vec(quantity_strategy(), 0..5)
        ) {
            let total_in: Decimal = purchases.iter().sum();
            let total_out: Decimal = sales.iter().sum();

            if total_in >= total_out {
                let rows_in: Vec<LedgerRow> = purchases
                    .iter()
                    .map(|q| LedgerRow { quantity: *q, active: true })
                    .collect();
                let rows_out: Vec<LedgerRow> = sales
                    .iter()
                    .map(|q| LedgerRow { quantity: *q, active: true })
                    .collect();

                let stock = derive_stock(&rows_in, &rows_out, &[], &[]);
                prop_assert_eq!(stock, (total_in - total_out).round_dp(2));
            }
        }

        /// Tombstoned rows never change the result
        #[test]
        fn prop_inactive_rows_have_no_effect(
            active_rows in prop::collection::vec(quantity_strategy(), 1..8),
            dead_rows in prop::collection::vec(quantity_strategy(), 0..8)
        ) {
            let live: Vec<LedgerRow> = active_rows
                .iter()
                .map(|q| LedgerRow { quantity: *q, active: true })
                .collect();
            let mut with_dead = live.clone();
            with_dead.extend(dead_rows.iter().map(|q| LedgerRow { quantity: *q, active: false }));

            let baseline = derive_stock(&live, &[], &[], &[]);
            let with_tombstones = derive_stock(&with_dead, &[], &[], &[]);
            prop_assert_eq!(baseline, with_tombstones);
        }

        /// Returns offset loads of the same size exactly
        #[test]
        fn prop_load_then_full_return_is_neutral(
            purchases in prop::collection::vec(quantity_strategy(), 1..8),
            moved in quantity_strategy()
        ) {
            let rows_in: Vec<LedgerRow> = purchases
                .iter()
                .map(|q| LedgerRow { quantity: *q, active: true })
                .collect();
            let movement = [LedgerRow { quantity: moved, active: true }];

            let untouched = derive_stock(&rows_in, &[], &[], &[]);
            let round_trip = derive_stock(&rows_in, &[], &movement, &movement);
            prop_assert_eq!(untouched, round_trip);
        }
    }
}
