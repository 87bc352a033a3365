//! Database models for the Distribution Management Platform
//!
//! Row types shared across services and handlers. Soft-deleted rows carry a
//! `deleted_at` tombstone in the database; queries always filter on it (and
//! on the parent's tombstone for ledger lines), so the tombstone column is
//! not part of the wire-facing structs.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog product with its two cached derived fields
///
/// `current_stock_quantity` and `cmup_cost` are derived from the transaction
/// ledger and refreshed by the calculators on every mutating transaction;
/// request handlers never write them directly.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub barcode: Option<String>,
    pub unit: Option<String>,
    pub current_stock_quantity: Decimal,
    pub cmup_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase invoice header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseInvoice {
    pub id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub invoice_image_path: Option<String>,
    /// Total computed from the invoice lines
    pub total_amount: Decimal,
    /// Total as declared on the paper invoice
    pub total_declared: Decimal,
    /// Declared and computed totals diverge by more than the tolerance
    pub has_total_mismatch: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase ledger line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PurchaseLine {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Sales receipt header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesReceipt {
    pub id: Uuid,
    pub receipt_number: String,
    pub distributor_id: Uuid,
    pub client_id: Uuid,
    pub receipt_date: NaiveDate,
    pub receipt_image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sale ledger line
///
/// `promo_quantity` is billed at zero but still consumes stock and cost.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SaleLine {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub promo_quantity: Decimal,
    pub selling_price: Decimal,
    pub price_type: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment recorded against a sales receipt
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesPayment {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A distributor's delivery cycle
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DistributorCycle {
    pub id: Uuid,
    pub distributor_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movement of goods between the central depot and a distributor cycle
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CycleMovement {
    pub id: Uuid,
    pub cycle_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub movement_type: String,
    pub movement_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Per-(distributor, product) van-stock balance
///
/// A satellite inventory separate from the central product stock; mutated
/// synchronously by sale create/update/delete, never by the calculators.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DistributorStock {
    pub id: Uuid,
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
