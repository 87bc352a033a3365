//! Distributor cycle tests
//!
//! Exercises the movement direction rules, the central-stock delta applied
//! when a movement is recorded, and the reconciliation summary produced when
//! a cycle closes.

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{stock_balance, CycleStatus, MovementType};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A cycle movement as the reconciliation sees it
#[derive(Debug, Clone, Copy)]
struct Movement {
    movement_type: MovementType,
    quantity: Decimal,
}

fn movement(movement_type: MovementType, quantity: &str) -> Movement {
    Movement {
        movement_type,
        quantity: dec(quantity),
    }
}

/// Central-stock delta applied when a movement is recorded
fn stock_delta(m: &Movement) -> Decimal {
    if m.movement_type.is_inbound() {
        m.quantity
    } else {
        -m.quantity
    }
}

fn total_loaded(movements: &[Movement]) -> Decimal {
    movements
        .iter()
        .filter(|m| !m.movement_type.is_inbound())
        .map(|m| m.quantity)
        .sum()
}

fn total_returned(movements: &[Movement]) -> Decimal {
    movements
        .iter()
        .filter(|m| m.movement_type.is_inbound())
        .map(|m| m.quantity)
        .sum()
}

/// What the distributor should still hold when the cycle closes
fn expected_balance(movements: &[Movement], total_sold: Decimal) -> Decimal {
    total_loaded(movements) - total_returned(movements) - total_sold
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Loads and reloads send goods out; only returns bring them back
    #[test]
    fn test_movement_directions() {
        assert!(!MovementType::Load.is_inbound());
        assert!(!MovementType::Reload.is_inbound());
        assert!(MovementType::Return.is_inbound());
    }

    /// Recording a movement adjusts the cached central stock by its delta
    #[test]
    fn test_stock_delta_signs() {
        assert_eq!(stock_delta(&movement(MovementType::Load, "40")), dec("-40"));
        assert_eq!(stock_delta(&movement(MovementType::Reload, "15")), dec("-15"));
        assert_eq!(stock_delta(&movement(MovementType::Return, "10")), dec("10"));
    }

    /// 100 loaded + 20 reloaded, 15 returned, 70 sold: 35 still on the van
    #[test]
    fn test_reconciliation_summary() {
        let movements = [
            movement(MovementType::Load, "100"),
            movement(MovementType::Reload, "20"),
            movement(MovementType::Return, "15"),
        ];

        assert_eq!(total_loaded(&movements), dec("120"));
        assert_eq!(total_returned(&movements), dec("15"));
        assert_eq!(expected_balance(&movements, dec("70")), dec("35"));
    }

    /// A cycle with no movements and no sales reconciles to zero
    #[test]
    fn test_empty_cycle_reconciles_to_zero() {
        assert_eq!(expected_balance(&[], Decimal::ZERO), Decimal::ZERO);
    }

    /// The per-movement cache deltas land where the ledger recompute lands
    #[test]
    fn test_movement_deltas_agree_with_recompute() {
        let purchased = dec("200");
        let movements = [
            movement(MovementType::Load, "80"),
            movement(MovementType::Return, "30"),
            movement(MovementType::Reload, "25"),
        ];

        let mut cached = purchased;
        for m in &movements {
            cached += stock_delta(m);
        }

        let recomputed = stock_balance(
            purchased,
            Decimal::ZERO,
            total_loaded(&movements),
            total_returned(&movements),
        );
        assert_eq!(cached, recomputed);
    }

    /// Movements are only accepted while the cycle is open
    #[test]
    fn test_closed_cycle_accepts_no_movements() {
        let accepts = |status: CycleStatus| status == CycleStatus::Open;

        assert!(accepts(CycleStatus::Open));
        assert!(!accepts(CycleStatus::Closed));
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

    /// Strategy for a movement of any type
    fn movement_strategy() -> impl Strategy<Value = Movement> {
        (
            prop_oneof![
                Just(MovementType::Load),
                Just(MovementType::Reload),
                Just(MovementType::Return),
            ],
            quantity_strategy(),
        )
            .prop_map(|(movement_type, quantity)| Movement {
                movement_type,
                quantity,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every movement is counted exactly once, on exactly one side
        #[test]
        fn prop_loaded_and_returned_partition_movements(
            movements in prop::collection::vec(movement_strategy(), 0..12)
        ) {
            let all: Decimal = movements.iter().map(|m| m.quantity).sum();
            prop_assert_eq!(total_loaded(&movements) + total_returned(&movements), all);
        }

        /// Applying deltas movement by movement matches the batch totals
        #[test]
        fn prop_incremental_deltas_match_totals(
            movements in prop::collection::vec(movement_strategy(), 0..12)
        ) {
            let stepped: Decimal = movements.iter().map(stock_delta).sum();
            let batch = total_returned(&movements) - total_loaded(&movements);
            prop_assert_eq!(stepped, batch);
        }

        /// Selling exactly what remains on the van reconciles to zero
        #[test]
        fn prop_full_sell_through_reconciles_to_zero(
            movements in prop::collection::vec(movement_strategy(), 1..12)
        ) {
            let on_van = total_loaded(&movements) - total_returned(&movements);
            prop_assert_eq!(expected_balance(&movements, on_van), Decimal::ZERO);
        }
    }
}
