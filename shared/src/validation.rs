//! Validation rules for ledger inputs
//!
//! Request-level field checks shared by the purchase and sale paths. All
//! helpers are pure; the backend wraps failures into its HTTP error type.

use rust_decimal::Decimal;

/// Declared-vs-computed invoice totals are flagged when they diverge by
/// more than this amount.
pub fn mismatch_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

// ============================================================================
// Ledger Line Validations
// ============================================================================

/// Validate a purchase or sale quantity (strictly positive)
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a promotional (free-of-charge) quantity (zero or positive)
pub fn validate_promo_quantity(promo_quantity: Decimal) -> Result<(), &'static str> {
    if promo_quantity < Decimal::ZERO {
        return Err("Promotional quantity cannot be negative");
    }
    Ok(())
}

/// Validate a unit price (zero or positive)
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Unit price cannot be negative");
    }
    Ok(())
}

/// Validate an invoice or receipt reference number
pub fn validate_reference_number(number: &str) -> Result<(), &'static str> {
    if number.trim().is_empty() {
        return Err("Reference number is required");
    }
    if number.len() > 255 {
        return Err("Reference number must be at most 255 characters");
    }
    Ok(())
}

// ============================================================================
// Invoice Total Reconciliation
// ============================================================================

/// Whether a declared invoice total disagrees with the computed line total
///
/// Informational only: a mismatch is flagged on the invoice but never blocks
/// persistence.
pub fn totals_mismatch(declared: Decimal, computed: Decimal) -> bool {
    (declared - computed).abs() > mismatch_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(dec("0.01")).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_validate_promo_quantity() {
        assert!(validate_promo_quantity(Decimal::ZERO).is_ok());
        assert!(validate_promo_quantity(dec("5")).is_ok());
        assert!(validate_promo_quantity(dec("-0.01")).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Decimal::ZERO).is_ok());
        assert!(validate_unit_price(dec("-0.5")).is_err());
    }

    #[test]
    fn test_validate_reference_number() {
        assert!(validate_reference_number("F202500001").is_ok());
        assert!(validate_reference_number("  ").is_err());
        assert!(validate_reference_number(&"9".repeat(256)).is_err());
    }

    #[test]
    fn test_totals_mismatch_threshold() {
        assert!(!totals_mismatch(dec("100.00"), dec("100.00")));
        // exactly at the tolerance is not a mismatch
        assert!(!totals_mismatch(dec("100.01"), dec("100.00")));
        assert!(totals_mismatch(dec("100.02"), dec("100.00")));
        assert!(totals_mismatch(dec("99.98"), dec("100.00")));
    }
}
