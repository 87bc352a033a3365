//! Sales receipt service managing van-stock decrements and central stock refresh

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{SaleLine, SalesPayment, SalesReceipt};
use crate::services::purchases::next_reference_number;
use crate::services::{remove_uploaded_file, ProductService, StockCalculator};
use shared::PriceType;

/// Sales receipt service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
}

/// One receipt line in a create/update request
#[derive(Debug, Deserialize)]
pub struct SaleItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Free-of-charge quantity; consumes van stock but bills nothing
    #[serde(default)]
    pub promo_quantity: Decimal,
    pub selling_price: Decimal,
    pub price_type: PriceType,
    pub note: Option<String>,
}

/// Input for creating or replacing a sales receipt
#[derive(Debug, Deserialize)]
pub struct SalesReceiptInput {
    pub receipt_number: String,
    pub distributor_id: Uuid,
    pub client_id: Uuid,
    pub receipt_date: NaiveDate,
    /// Path of an already-stored receipt document, if any
    pub receipt_image_path: Option<String>,
    pub items: Vec<SaleItemInput>,
}

/// Receipt header with its active lines and payments
#[derive(Debug, Clone, Serialize)]
pub struct SalesReceiptWithLines {
    #[serde(flatten)]
    pub receipt: SalesReceipt,
    pub lines: Vec<SaleLine>,
    pub payments: Vec<SalesPayment>,
}

/// Filters for listing receipts
#[derive(Debug, Default, Deserialize)]
pub struct ListSalesFilter {
    pub distributor_id: Option<Uuid>,
}

/// Input for recording a payment against a receipt
#[derive(Debug, Deserialize)]
pub struct AddPaymentInput {
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
}

impl SalesService {
    /// Create a new SalesService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a sales receipt
    ///
    /// Each line requires `quantity + promo_quantity` available in the
    /// distributor's van stock; any shortfall aborts the whole transaction
    /// with an insufficient-stock error and no partial sale is persisted.
    pub async fn create(&self, input: SalesReceiptInput) -> AppResult<SalesReceiptWithLines> {
        self.validate(&input)?;
        self.check_references(&input).await?;
        self.check_unique_receipt_number(&input.receipt_number, None)
            .await?;

        let result = self.create_in_transaction(&input).await;
        if result.is_err() {
            if let Some(path) = &input.receipt_image_path {
                remove_uploaded_file(path).await;
            }
        }
        result
    }

    async fn create_in_transaction(
        &self,
        input: &SalesReceiptInput,
    ) -> AppResult<SalesReceiptWithLines> {
        let mut tx = self.db.begin().await?;

        let receipt_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sales_receipts (receipt_number, distributor_id, client_id, receipt_date,
                                        receipt_image_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&input.receipt_number)
        .bind(input.distributor_id)
        .bind(input.client_id)
        .bind(input.receipt_date)
        .bind(&input.receipt_image_path)
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, receipt_id, input.distributor_id, &input.items).await?;
        refresh_central_stock(&mut tx, input.items.iter().map(|i| i.product_id)).await?;

        tx.commit().await?;

        self.get(receipt_id).await
    }

    /// Replace a receipt's header and lines
    ///
    /// Van stock for the old lines is restored first (to the receipt's
    /// previous distributor), then the new lines are validated and taken
    /// exactly as in create. A mid-way shortfall rolls everything back,
    /// restorations included.
    pub async fn update(
        &self,
        receipt_id: Uuid,
        input: SalesReceiptInput,
    ) -> AppResult<SalesReceiptWithLines> {
        self.validate(&input)?;
        let existing = self.get_header(receipt_id).await?;
        self.check_references(&input).await?;
        self.check_unique_receipt_number(&input.receipt_number, Some(receipt_id))
            .await?;

        let result = self
            .update_in_transaction(receipt_id, existing.distributor_id, &input)
            .await;
        if result.is_err() {
            if let Some(path) = &input.receipt_image_path {
                if existing.receipt_image_path.as_deref() != Some(path.as_str()) {
                    remove_uploaded_file(path).await;
                }
            }
        }
        result
    }

    async fn update_in_transaction(
        &self,
        receipt_id: Uuid,
        old_distributor_id: Uuid,
        input: &SalesReceiptInput,
    ) -> AppResult<SalesReceiptWithLines> {
        let mut tx = self.db.begin().await?;

        let old_lines = active_lines(&mut tx, receipt_id).await?;
        restore_van_stock(&mut tx, old_distributor_id, &old_lines).await?;

        sqlx::query("UPDATE sale_lines SET deleted_at = NOW() WHERE receipt_id = $1 AND deleted_at IS NULL")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE sales_receipts
            SET receipt_number = $1, distributor_id = $2, client_id = $3, receipt_date = $4,
                receipt_image_path = $5, updated_at = NOW()
            WHERE id = $6
            "#,
        )
        .bind(&input.receipt_number)
        .bind(input.distributor_id)
        .bind(input.client_id)
        .bind(input.receipt_date)
        .bind(&input.receipt_image_path)
        .bind(receipt_id)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, receipt_id, input.distributor_id, &input.items).await?;
        refresh_central_stock(
            &mut tx,
            old_lines
                .iter()
                .map(|l| l.product_id)
                .chain(input.items.iter().map(|i| i.product_id)),
        )
        .await?;

        tx.commit().await?;

        self.get(receipt_id).await
    }

    /// Soft-delete a receipt, restoring van stock and retiring its payments
    pub async fn delete(&self, receipt_id: Uuid) -> AppResult<()> {
        let existing = self.get_header(receipt_id).await?;

        let mut tx = self.db.begin().await?;

        let lines = active_lines(&mut tx, receipt_id).await?;
        restore_van_stock(&mut tx, existing.distributor_id, &lines).await?;

        sqlx::query("UPDATE sale_lines SET deleted_at = NOW() WHERE receipt_id = $1 AND deleted_at IS NULL")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE sales_payments SET deleted_at = NOW() WHERE receipt_id = $1 AND deleted_at IS NULL")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE sales_receipts SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        refresh_central_stock(&mut tx, lines.iter().map(|l| l.product_id)).await?;

        tx.commit().await?;

        tracing::info!(%receipt_id, "sales receipt deleted");
        Ok(())
    }

    /// List live receipts, optionally filtered by distributor
    pub async fn list(&self, filter: ListSalesFilter) -> AppResult<Vec<SalesReceiptWithLines>> {
        let receipts = sqlx::query_as::<_, SalesReceipt>(
            r#"
            SELECT id, receipt_number, distributor_id, client_id, receipt_date,
                   receipt_image_path, created_at, updated_at
            FROM sales_receipts
            WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR distributor_id = $1)
            ORDER BY receipt_date DESC, created_at DESC
            "#,
        )
        .bind(filter.distributor_id)
        .fetch_all(&self.db)
        .await?;

        let receipt_ids: Vec<Uuid> = receipts.iter().map(|r| r.id).collect();
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, receipt_id, product_id, quantity, promo_quantity, selling_price,
                   price_type, note, created_at
            FROM sale_lines
            WHERE receipt_id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(&receipt_ids)
        .fetch_all(&self.db)
        .await?;

        let payments = sqlx::query_as::<_, SalesPayment>(
            r#"
            SELECT id, receipt_id, amount, payment_date, created_at
            FROM sales_payments
            WHERE receipt_id = ANY($1) AND deleted_at IS NULL
            ORDER BY payment_date
            "#,
        )
        .bind(&receipt_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(receipts
            .into_iter()
            .map(|receipt| {
                let lines = lines
                    .iter()
                    .filter(|l| l.receipt_id == receipt.id)
                    .cloned()
                    .collect();
                let payments = payments
                    .iter()
                    .filter(|p| p.receipt_id == receipt.id)
                    .cloned()
                    .collect();
                SalesReceiptWithLines {
                    receipt,
                    lines,
                    payments,
                }
            })
            .collect())
    }

    /// Get a receipt with its active lines and payments
    pub async fn get(&self, receipt_id: Uuid) -> AppResult<SalesReceiptWithLines> {
        let receipt = self.get_header(receipt_id).await?;

        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, receipt_id, product_id, quantity, promo_quantity, selling_price,
                   price_type, note, created_at
            FROM sale_lines
            WHERE receipt_id = $1 AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&self.db)
        .await?;

        let payments = sqlx::query_as::<_, SalesPayment>(
            r#"
            SELECT id, receipt_id, amount, payment_date, created_at
            FROM sales_payments
            WHERE receipt_id = $1 AND deleted_at IS NULL
            ORDER BY payment_date
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&self.db)
        .await?;

        Ok(SalesReceiptWithLines {
            receipt,
            lines,
            payments,
        })
    }

    /// Record a payment against a live receipt
    pub async fn add_payment(
        &self,
        receipt_id: Uuid,
        input: AddPaymentInput,
    ) -> AppResult<SalesPayment> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "amount".to_string(),
                message: "Payment amount must be greater than zero".to_string(),
                message_fr: "Le montant du paiement doit être supérieur à zéro".to_string(),
            });
        }
        self.get_header(receipt_id).await?;

        let payment_date = input.payment_date.unwrap_or_else(|| {
            chrono::Utc::now().date_naive()
        });

        let payment = sqlx::query_as::<_, SalesPayment>(
            r#"
            INSERT INTO sales_payments (receipt_id, amount, payment_date)
            VALUES ($1, $2, $3)
            RETURNING id, receipt_id, amount, payment_date, created_at
            "#,
        )
        .bind(receipt_id)
        .bind(input.amount)
        .bind(payment_date)
        .fetch_one(&self.db)
        .await?;

        Ok(payment)
    }

    /// Soft-delete a single payment
    pub async fn delete_payment(&self, payment_id: Uuid) -> AppResult<()> {
        let affected = sqlx::query(
            "UPDATE sales_payments SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(payment_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound("Payment".to_string()));
        }
        Ok(())
    }

    /// Next free receipt number for the current year (R + year + 5 digits)
    pub async fn next_receipt_number(&self, year: i32) -> AppResult<String> {
        next_reference_number(&self.db, "sales_receipts", "receipt_number", "R", year).await
    }

    async fn get_header(&self, receipt_id: Uuid) -> AppResult<SalesReceipt> {
        sqlx::query_as::<_, SalesReceipt>(
            r#"
            SELECT id, receipt_number, distributor_id, client_id, receipt_date,
                   receipt_image_path, created_at, updated_at
            FROM sales_receipts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(receipt_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales receipt".to_string()))
    }

    async fn check_unique_receipt_number(
        &self,
        receipt_number: &str,
        exclude_id: Option<Uuid>,
    ) -> AppResult<()> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sales_receipts
                WHERE receipt_number = $1 AND deleted_at IS NULL AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(receipt_number)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(AppError::DuplicateEntry("receipt_number".to_string()));
        }
        Ok(())
    }

    async fn check_references(&self, input: &SalesReceiptInput) -> AppResult<()> {
        let distributor_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM distributors WHERE id = $1)")
                .bind(input.distributor_id)
                .fetch_one(&self.db)
                .await?;
        if !distributor_exists {
            return Err(AppError::NotFound("Distributor".to_string()));
        }

        let client_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1)")
                .bind(input.client_id)
                .fetch_one(&self.db)
                .await?;
        if !client_exists {
            return Err(AppError::NotFound("Client".to_string()));
        }

        Ok(())
    }

    fn validate(&self, input: &SalesReceiptInput) -> AppResult<()> {
        shared::validate_reference_number(&input.receipt_number).map_err(|msg| {
            AppError::Validation {
                field: "receipt_number".to_string(),
                message: msg.to_string(),
                message_fr: "Le numéro de reçu est invalide".to_string(),
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
            shared::validate_promo_quantity(item.promo_quantity).map_err(|msg| {
                AppError::Validation {
                    field: "items.promo_quantity".to_string(),
                    message: msg.to_string(),
                    message_fr: "La quantité promotionnelle ne peut pas être négative".to_string(),
                }
            })?;
            shared::validate_unit_price(item.selling_price).map_err(|msg| {
                AppError::Validation {
                    field: "items.selling_price".to_string(),
                    message: msg.to_string(),
                    message_fr: "Le prix de vente ne peut pas être négatif".to_string(),
                }
            })?;
        }

        Ok(())
    }
}

/// An active sale line's van-stock-relevant fields
#[derive(Debug, sqlx::FromRow)]
struct ActiveSaleLine {
    product_id: Uuid,
    quantity: Decimal,
    promo_quantity: Decimal,
}

async fn active_lines(
    tx: &mut Transaction<'_, Postgres>,
    receipt_id: Uuid,
) -> AppResult<Vec<ActiveSaleLine>> {
    let lines = sqlx::query_as::<_, ActiveSaleLine>(
        r#"
        SELECT product_id, quantity, promo_quantity
        FROM sale_lines
        WHERE receipt_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(receipt_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(lines)
}

/// Validate availability, take van stock, and insert each line
///
/// Items are processed in ascending product order so concurrent sales for
/// the same distributor lock van-stock rows in a stable order.
async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    receipt_id: Uuid,
    distributor_id: Uuid,
    items: &[SaleItemInput],
) -> AppResult<()> {
    let mut ordered: Vec<&SaleItemInput> = items.iter().collect();
    ordered.sort_by_key(|i| i.product_id);

    for item in ordered {
        let required = item.quantity + item.promo_quantity;

        let product_name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM products WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(item.product_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let available = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT quantity FROM distributor_stocks
            WHERE distributor_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(distributor_id)
        .bind(item.product_id)
        .fetch_optional(&mut **tx)
        .await?
        .unwrap_or(Decimal::ZERO);

        if available < required {
            return Err(AppError::InsufficientStock {
                product_name,
                available,
                requested: required,
            });
        }

        sqlx::query(
            r#"
            UPDATE distributor_stocks
            SET quantity = quantity - $1, updated_at = NOW()
            WHERE distributor_id = $2 AND product_id = $3
            "#,
        )
        .bind(required)
        .bind(distributor_id)
        .bind(item.product_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sale_lines (receipt_id, product_id, quantity, promo_quantity,
                                    selling_price, price_type, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(receipt_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.promo_quantity)
        .bind(item.selling_price)
        .bind(item.price_type.as_str())
        .bind(&item.note)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Give back `quantity + promo_quantity` of van stock for each line
///
/// Upserts so a row removed by manual reconciliation cannot lose the
/// restoration.
async fn restore_van_stock(
    tx: &mut Transaction<'_, Postgres>,
    distributor_id: Uuid,
    lines: &[ActiveSaleLine],
) -> AppResult<()> {
    let mut ordered: Vec<&ActiveSaleLine> = lines.iter().collect();
    ordered.sort_by_key(|l| l.product_id);

    for line in ordered {
        sqlx::query(
            r#"
            INSERT INTO distributor_stocks (distributor_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (distributor_id, product_id)
            DO UPDATE SET quantity = distributor_stocks.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            "#,
        )
        .bind(distributor_id)
        .bind(line.product_id)
        .bind(line.quantity + line.promo_quantity)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Refresh the central cached stock of every affected product
///
/// Sales reach the central product stock only through the full recompute
/// formula; CMUP is never touched here.
async fn refresh_central_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_ids: impl Iterator<Item = Uuid>,
) -> AppResult<()> {
    let affected: Vec<Uuid> = product_ids.collect::<BTreeSet<_>>().into_iter().collect();
    ProductService::lock_products_in_order(&mut *tx, affected.iter().copied()).await?;
    StockCalculator::update_stock_for_products(&mut *tx, &affected).await?;
    Ok(())
}
