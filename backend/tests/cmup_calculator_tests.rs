//! CMUP (weighted-average unit cost) tests
//!
//! Exercises both derivation paths: the full recompute over the purchase
//! ledger and the O(1) incremental update used when a single line is added,
//! including the ordering contract between the CMUP update and the stock
//! increment.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{incremental_average_cost, weighted_average_cost};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A purchase line as the recompute sees it
#[derive(Debug, Clone, Copy)]
struct PurchaseLine {
    quantity: Decimal,
    price: Decimal,
    active: bool,
}

fn line(quantity: &str, price: &str) -> PurchaseLine {
    PurchaseLine {
        quantity: dec(quantity),
        price: dec(price),
        active: true,
    }
}

/// Full recompute over active purchase lines
fn recompute_cmup(lines: &[PurchaseLine]) -> Decimal {
    let total_cost: Decimal = lines
        .iter()
        .filter(|l| l.active)
        .map(|l| l.quantity * l.price)
        .sum();
    let total_quantity: Decimal = lines
        .iter()
        .filter(|l| l.active)
        .map(|l| l.quantity)
        .sum();
    weighted_average_cost(total_cost, total_quantity)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// First purchase on an empty product: the new price sets the cost
    #[test]
    fn test_first_purchase_sets_cmup() {
        let stock = Decimal::ZERO;
        let cmup = Decimal::ZERO;

        let new_cmup = incremental_average_cost(stock, cmup, dec("100"), dec("10.00"));
        assert_eq!(new_cmup, dec("10.00"));

        // Stock increment happens after the CMUP update
        let stock = stock + dec("100");
        assert_eq!(stock, dec("100"));
    }

    /// Second purchase blends against the pre-increment stock
    #[test]
    fn test_second_purchase_blends() {
        // 100 on hand at 10.00; buy 50 at 16.00
        // ((100 × 10) + (16 × 50)) / 150 = 1800 / 150 = 12.00
        let new_cmup = incremental_average_cost(dec("100"), dec("10.00"), dec("50"), dec("16.00"));
        assert_eq!(new_cmup, dec("12.00"));
    }

    /// Removing a purchase goes through the full recompute
    #[test]
    fn test_removal_recomputes_from_remaining_lines() {
        let mut lines = vec![line("100", "10.00"), line("50", "16.00")];
        assert_eq!(recompute_cmup(&lines), dec("12.00"));

        // Soft-delete the first purchase: only 50 @ 16.00 remains
        lines[0].active = false;
        assert_eq!(recompute_cmup(&lines), dec("16.00"));

        let remaining_stock: Decimal = lines
            .iter()
            .filter(|l| l.active)
            .map(|l| l.quantity)
            .sum();
        assert_eq!(remaining_stock, dec("50"));
    }

    /// No active purchase lines: CMUP is zero, not a division error
    #[test]
    fn test_zero_quantity_guard() {
        assert_eq!(recompute_cmup(&[]), Decimal::ZERO);

        let mut lines = vec![line("100", "10.00")];
        lines[0].active = false;
        assert_eq!(recompute_cmup(&lines), Decimal::ZERO);
    }

    /// Lines under a soft-deleted invoice contribute nothing
    #[test]
    fn test_soft_deleted_lines_excluded() {
        let lines = vec![
            line("100", "10.00"),
            PurchaseLine {
                quantity: dec("1000"),
                price: dec("99.00"),
                active: false,
            },
        ];
        assert_eq!(recompute_cmup(&lines), dec("10.00"));
    }

    /// Full recompute twice in a row yields the same value
    #[test]
    fn test_recompute_is_idempotent() {
        let lines = vec![line("30", "7.50"), line("20", "9.00")];
        assert_eq!(recompute_cmup(&lines), recompute_cmup(&lines));
    }

    /// Feeding the post-increment stock into the incremental formula
    /// double-counts the new quantity and diverges from the true average.
    #[test]
    fn test_post_increment_stock_corrupts_average() {
        let correct = incremental_average_cost(dec("100"), dec("10.00"), dec("50"), dec("16.00"));
        assert_eq!(correct, dec("12.00"));

        // Stock already incremented to 150 before the CMUP update ran:
        // ((150 × 10) + (16 × 50)) / 200 = 11.50, which is wrong.
        let wrong = incremental_average_cost(dec("150"), dec("10.00"), dec("50"), dec("16.00"));
        assert_eq!(wrong, dec("11.50"));
        assert_ne!(wrong, correct);
    }

    /// The incremental chain agrees exactly with the full recompute on
    /// histories whose averages land on two decimals.
    #[test]
    fn test_incremental_chain_matches_recompute() {
        let purchases = [("100", "10.00"), ("50", "16.00"), ("150", "14.00")];

        let mut stock = Decimal::ZERO;
        let mut cmup = Decimal::ZERO;
        let mut lines = Vec::new();
        for (qty, price) in purchases {
            cmup = incremental_average_cost(stock, cmup, dec(qty), dec(price));
            stock += dec(qty);
            lines.push(line(qty, price));
        }

        assert_eq!(cmup, recompute_cmup(&lines));
        assert_eq!(stock, dec("300"));
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

    /// Strategy for generating valid unit prices
    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 2)) // 0.01 to 1000.00
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The weighted average always lies between the cheapest and the
        /// most expensive purchase price.
        #[test]
        fn prop_cmup_bounded_by_prices(
            purchases in prop::collection::vec((quantity_strategy(), price_strategy()), 1..10)
        ) {
            let lines: Vec<PurchaseLine> = purchases
                .iter()
                .map(|(q, p)| PurchaseLine { quantity: *q, price: *p, active: true })
                .collect();
            let cmup = recompute_cmup(&lines);

            let min_price = purchases.iter().map(|(_, p)| *p).min().unwrap();
            let max_price = purchases.iter().map(|(_, p)| *p).max().unwrap();

            // round_dp can nudge past the bound by at most half a cent
            prop_assert!(cmup >= min_price - dec("0.005"));
            prop_assert!(cmup <= max_price + dec("0.005"));
        }

        /// The incremental chain tracks the full recompute within the
        /// rounding drift it accumulates (each step rounds to 2 decimals).
        #[test]
        fn prop_incremental_tracks_recompute(
            purchases in prop::collection::vec((quantity_strategy(), price_strategy()), 1..8)
        ) {
            let mut stock = Decimal::ZERO;
            let mut cmup = Decimal::ZERO;
            let mut lines = Vec::new();
            for (qty, price) in &purchases {
                cmup = incremental_average_cost(stock, cmup, *qty, *price);
                stock += *qty;
                lines.push(PurchaseLine { quantity: *qty, price: *price, active: true });
            }

            let full = recompute_cmup(&lines);
            let tolerance = dec("0.01") * Decimal::from(purchases.len() as i64);
            prop_assert!((cmup - full).abs() <= tolerance,
                "incremental {} vs recompute {} beyond tolerance {}", cmup, full, tolerance);
        }

        /// Zero-quantity guard never panics, whatever the cost
        #[test]
        fn prop_zero_quantity_never_divides(cost in price_strategy()) {
            prop_assert_eq!(weighted_average_cost(cost, Decimal::ZERO), Decimal::ZERO);
        }

        /// Buying at a single constant price keeps the average at that price
        #[test]
        fn prop_constant_price_is_fixed_point(
            quantities in prop::collection::vec(quantity_strategy(), 1..8),
            price in price_strategy()
        ) {
            let mut stock = Decimal::ZERO;
            let mut cmup = Decimal::ZERO;
            for qty in &quantities {
                cmup = incremental_average_cost(stock, cmup, *qty, price);
                stock += *qty;
            }
            prop_assert_eq!(cmup, price);
        }
    }
}
