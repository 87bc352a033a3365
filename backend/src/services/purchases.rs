//! Purchase invoice service orchestrating ledger writes and stock/CMUP refresh

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PurchaseInvoice, PurchaseLine};
use crate::services::{remove_uploaded_file, CmupCalculator, ProductService};

/// Purchase invoice service
#[derive(Clone)]
pub struct PurchaseService {
    db: PgPool,
}

/// One invoice line in a create/update request
#[derive(Debug, Deserialize)]
pub struct PurchaseItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub purchase_price: Decimal,
}

/// Input for creating or replacing a purchase invoice
#[derive(Debug, Deserialize)]
pub struct PurchaseInvoiceInput {
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    /// Path of an already-stored invoice document, if any
    pub invoice_image_path: Option<String>,
    /// Total as declared on the paper invoice; defaults to the computed total
    pub total_declared: Option<Decimal>,
    pub notes: Option<String>,
    pub items: Vec<PurchaseItemInput>,
}

/// Invoice header together with its active lines
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseInvoiceWithLines {
    #[serde(flatten)]
    pub invoice: PurchaseInvoice,
    pub lines: Vec<PurchaseLine>,
}

impl PurchaseService {
    /// Create a new PurchaseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a purchase invoice with its lines
    ///
    /// For each line, the product row is locked, CMUP is updated
    /// incrementally against the pre-increment stock, and only then is the
    /// stock increment applied. Everything is one atomic unit; on failure
    /// the staged invoice document (if any) is removed best-effort.
    pub async fn create(&self, input: PurchaseInvoiceInput) -> AppResult<PurchaseInvoiceWithLines> {
        self.validate(&input)?;
        self.check_unique_invoice_number(&input.invoice_number, None)
            .await?;

        let result = self.create_in_transaction(&input).await;
        if result.is_err() {
            if let Some(path) = &input.invoice_image_path {
                remove_uploaded_file(path).await;
            }
        }
        result
    }

    async fn create_in_transaction(
        &self,
        input: &PurchaseInvoiceInput,
    ) -> AppResult<PurchaseInvoiceWithLines> {
        let (total_amount, total_declared, has_mismatch) = invoice_totals(input);

        let mut tx = self.db.begin().await?;

        let invoice_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO purchase_invoices (supplier_id, supplier_name, invoice_number, invoice_date,
                                           invoice_image_path, total_amount, total_declared,
                                           has_total_mismatch, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(input.supplier_id)
        .bind(&input.supplier_name)
        .bind(&input.invoice_number)
        .bind(input.invoice_date)
        .bind(&input.invoice_image_path)
        .bind(total_amount)
        .bind(total_declared)
        .bind(has_mismatch)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        ProductService::lock_products_in_order(&mut tx, input.items.iter().map(|i| i.product_id))
            .await?;
        insert_lines(&mut tx, invoice_id, &input.items).await?;

        tx.commit().await?;

        self.get(invoice_id).await
    }

    /// Replace a purchase invoice's header and lines
    ///
    /// Old lines are reversed out of stock and soft-deleted, affected
    /// products get a full CMUP recompute (incremental reversal is never
    /// attempted), then the new lines go through the same incremental path
    /// as creation. One transaction end to end.
    pub async fn update(
        &self,
        invoice_id: Uuid,
        input: PurchaseInvoiceInput,
    ) -> AppResult<PurchaseInvoiceWithLines> {
        self.validate(&input)?;
        let existing = self.get_header(invoice_id).await?;
        self.check_unique_invoice_number(&input.invoice_number, Some(invoice_id))
            .await?;

        let result = self.update_in_transaction(invoice_id, &input).await;
        if result.is_err() {
            // Only remove a newly staged document, never the one already on file
            if let Some(path) = &input.invoice_image_path {
                if existing.invoice_image_path.as_deref() != Some(path.as_str()) {
                    remove_uploaded_file(path).await;
                }
            }
        }
        result
    }

    async fn update_in_transaction(
        &self,
        invoice_id: Uuid,
        input: &PurchaseInvoiceInput,
    ) -> AppResult<PurchaseInvoiceWithLines> {
        let (total_amount, total_declared, has_mismatch) = invoice_totals(input);

        let mut tx = self.db.begin().await?;

        let old_lines = active_lines(&mut tx, invoice_id).await?;

        // Lock every product touched by the old or the new lines before any
        // stock/cmup write, in ascending id order so concurrent invoice
        // mutations cannot deadlock.
        ProductService::lock_products_in_order(
            &mut tx,
            old_lines
                .iter()
                .map(|l| l.product_id)
                .chain(input.items.iter().map(|i| i.product_id)),
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE purchase_invoices
            SET supplier_id = $1, supplier_name = $2, invoice_number = $3, invoice_date = $4,
                invoice_image_path = $5, total_amount = $6, total_declared = $7,
                has_total_mismatch = $8, notes = $9, updated_at = NOW()
            WHERE id = $10
            "#,
        )
        .bind(input.supplier_id)
        .bind(&input.supplier_name)
        .bind(&input.invoice_number)
        .bind(input.invoice_date)
        .bind(&input.invoice_image_path)
        .bind(total_amount)
        .bind(total_declared)
        .bind(has_mismatch)
        .bind(&input.notes)
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

        reverse_lines(&mut tx, invoice_id, &old_lines).await?;
        insert_lines(&mut tx, invoice_id, &input.items).await?;

        tx.commit().await?;

        self.get(invoice_id).await
    }

    /// Soft-delete an invoice and reverse its effect on stock and CMUP
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        self.get_header(invoice_id).await?;

        let mut tx = self.db.begin().await?;

        let lines = active_lines(&mut tx, invoice_id).await?;
        ProductService::lock_products_in_order(&mut tx, lines.iter().map(|l| l.product_id)).await?;

        reverse_lines(&mut tx, invoice_id, &lines).await?;

        sqlx::query(
            "UPDATE purchase_invoices SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(invoice_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%invoice_id, "purchase invoice deleted");
        Ok(())
    }

    /// List live invoices with their active lines
    pub async fn list(&self) -> AppResult<Vec<PurchaseInvoiceWithLines>> {
        let invoices = sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT id, supplier_id, supplier_name, invoice_number, invoice_date,
                   invoice_image_path, total_amount, total_declared, has_total_mismatch,
                   notes, created_at, updated_at
            FROM purchase_invoices
            WHERE deleted_at IS NULL
            ORDER BY invoice_date DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let invoice_ids: Vec<Uuid> = invoices.iter().map(|i| i.id).collect();
        let lines = sqlx::query_as::<_, PurchaseLine>(
            r#"
            SELECT id, invoice_id, product_id, quantity, purchase_price, created_at
            FROM purchase_lines
            WHERE invoice_id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(&invoice_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let lines = lines
                    .iter()
                    .filter(|l| l.invoice_id == invoice.id)
                    .cloned()
                    .collect();
                PurchaseInvoiceWithLines { invoice, lines }
            })
            .collect())
    }

    /// Get an invoice with its active lines
    pub async fn get(&self, invoice_id: Uuid) -> AppResult<PurchaseInvoiceWithLines> {
        let invoice = self.get_header(invoice_id).await?;

        let lines = sqlx::query_as::<_, PurchaseLine>(
            r#"
            SELECT id, invoice_id, product_id, quantity, purchase_price, created_at
            FROM purchase_lines
            WHERE invoice_id = $1 AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PurchaseInvoiceWithLines { invoice, lines })
    }

    /// Next free invoice number for the current year (F + year + 5 digits)
    pub async fn next_invoice_number(&self, year: i32) -> AppResult<String> {
        next_reference_number(&self.db, "purchase_invoices", "invoice_number", "F", year).await
    }

    async fn get_header(&self, invoice_id: Uuid) -> AppResult<PurchaseInvoice> {
        sqlx::query_as::<_, PurchaseInvoice>(
            r#"
            SELECT id, supplier_id, supplier_name, invoice_number, invoice_date,
                   invoice_image_path, total_amount, total_declared, has_total_mismatch,
                   notes, created_at, updated_at
            FROM purchase_invoices
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Purchase invoice".to_string()))
    }

    async fn check_unique_invoice_number(
        &self,
        invoice_number: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM purchase_invoices
                WHERE invoice_number = $1 AND deleted_at IS NULL AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(invoice_number)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::DuplicateEntry("invoice_number".to_string()));
        }
        Ok(())
    }

    fn validate(&self, input: &PurchaseInvoiceInput) -> AppResult<()> {
        if input.supplier_name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "supplier_name".to_string(),
                message: "Supplier name is required".to_string(),
                message_fr: "Le nom du fournisseur est requis".to_string(),
            });
        }

        shared::validate_reference_number(&input.invoice_number).map_err(|msg| {
            AppError::Validation {
                field: "invoice_number".to_string(),
                message: msg.to_string(),
                message_fr: "Le numéro de facture est invalide".to_string(),
            }
        })?;

        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "At least one item is required".to_string(),
                message_fr: "Au moins un article est requis".to_string(),
            });
        }

        for item in &input.items {
            shared::validate_quantity(item.quantity).map_err(|msg| AppError::Validation {
                field: "items.quantity".to_string(),
                message: msg.to_string(),
                message_fr: "La quantité doit être supérieure à zéro".to_string(),
            })?;
            shared::validate_unit_price(item.purchase_price).map_err(|msg| {
                AppError::Validation {
                    field: "items.purchase_price".to_string(),
                    message: msg.to_string(),
                    message_fr: "Le prix d'achat ne peut pas être négatif".to_string(),
                }
            })?;
        }

        Ok(())
    }
}

/// Computed total, declared total, and the mismatch flag for an input
fn invoice_totals(input: &PurchaseInvoiceInput) -> (Decimal, Decimal, bool) {
    let total_amount: Decimal = input
        .items
        .iter()
        .map(|i| i.quantity * i.purchase_price)
        .sum::<Decimal>()
        .round_dp(2);
    let total_declared = input.total_declared.unwrap_or(total_amount);
    let has_mismatch = shared::totals_mismatch(total_declared, total_amount);
    (total_amount, total_declared, has_mismatch)
}

/// An active line's stock-relevant fields
#[derive(Debug, sqlx::FromRow)]
struct ActiveLine {
    product_id: Uuid,
    quantity: Decimal,
}

async fn active_lines(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
) -> AppResult<Vec<ActiveLine>> {
    let lines = sqlx::query_as::<_, ActiveLine>(
        r#"
        SELECT product_id, quantity
        FROM purchase_lines
        WHERE invoice_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(lines)
}

/// Insert new lines: per line, incremental CMUP against the pre-increment
/// stock, then the stock increment, strictly in that order.
async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    items: &[PurchaseItemInput],
) -> AppResult<()> {
    for item in items {
        // Re-read under the lock held by this transaction: an earlier item
        // for the same product must be visible here.
        let (current_stock, current_cmup) =
            ProductService::lock_stock_fields(&mut *tx, item.product_id).await?;

        sqlx::query(
            r#"
            INSERT INTO purchase_lines (invoice_id, product_id, quantity, purchase_price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(invoice_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.purchase_price)
        .execute(&mut **tx)
        .await?;

        CmupCalculator::update_cmup_incremental(
            &mut *tx,
            item.product_id,
            current_stock,
            current_cmup,
            item.quantity,
            item.purchase_price,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE products
            SET current_stock_quantity = current_stock_quantity + $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(item.quantity)
        .bind(item.product_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Reverse the stock effect of the given lines, soft-delete them, and run a
/// full CMUP recompute for every product that lost a line.
async fn reverse_lines(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
    lines: &[ActiveLine],
) -> AppResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            UPDATE products
            SET current_stock_quantity = current_stock_quantity - $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(line.quantity)
        .bind(line.product_id)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query("UPDATE purchase_lines SET deleted_at = NOW() WHERE invoice_id = $1 AND deleted_at IS NULL")
        .bind(invoice_id)
        .execute(&mut **tx)
        .await?;

    let removed_products: Vec<Uuid> = lines
        .iter()
        .map(|l| l.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    CmupCalculator::update_cmup_for_products(&mut *tx, &removed_products).await?;

    Ok(())
}

/// Next free reference number of the form `<prefix><year><5-digit sequence>`
///
/// Scans every number for the year, soft-deleted rows included, so a number
/// is never reissued.
pub(crate) async fn next_reference_number(
    db: &PgPool,
    table: &str,
    column: &str,
    prefix: &str,
    year: i32,
) -> AppResult<String> {
    let pattern = format!("{prefix}{year}%");
    let query = format!("SELECT {column} FROM {table} WHERE {column} LIKE $1");
    let numbers = sqlx::query_scalar::<_, String>(&query)
        .bind(&pattern)
        .fetch_all(db)
        .await?;

    let head = format!("{prefix}{year}");
    let mut next = 1u32;
    for number in &numbers {
        if let Some(suffix) = number.strip_prefix(&head) {
            if suffix.len() == 5 {
                if let Ok(n) = suffix.parse::<u32>() {
                    if n >= next {
                        next = n + 1;
                    }
                }
            }
        }
    }

    Ok(format!("{head}{next:05}"))
}
