//! Stock calculation service deriving on-hand quantities from the transaction ledger

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// Derives and persists `products.current_stock_quantity`
pub struct StockCalculator;

impl StockCalculator {
    /// Compute on-hand stock for a product from the full ledger
    ///
    /// `stock = active purchases − active sales (billed + promo) − active
    /// cycle loads/reloads + active cycle returns`, floored at zero. A row
    /// counts as active when neither it nor its parent is soft-deleted.
    pub async fn calculate_stock(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Decimal> {
        let total_purchased = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(pl.quantity), 0)
            FROM purchase_lines pl
            JOIN purchase_invoices pi ON pi.id = pl.invoice_id
            WHERE pl.product_id = $1
              AND pl.deleted_at IS NULL
              AND pi.deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        let total_sold = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(sl.quantity + sl.promo_quantity), 0)
            FROM sale_lines sl
            JOIN sales_receipts sr ON sr.id = sl.receipt_id
            WHERE sl.product_id = $1
              AND sl.deleted_at IS NULL
              AND sr.deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        let total_loaded = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM cycle_movements
            WHERE product_id = $1
              AND movement_type IN ('load', 'reload')
              AND deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        let total_returned = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM cycle_movements
            WHERE product_id = $1
              AND movement_type = 'return'
              AND deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(shared::stock_balance(
            total_purchased,
            total_sold,
            total_loaded,
            total_returned,
        ))
    }

    /// Compute and persist stock for a product, returning the new value
    pub async fn update_stock(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Decimal> {
        let stock = Self::calculate_stock(&mut *conn, product_id).await?;

        sqlx::query("UPDATE products SET current_stock_quantity = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

        Ok(stock)
    }

    /// Update stock for a set of products
    pub async fn update_stock_for_products(
        conn: &mut PgConnection,
        product_ids: &[Uuid],
    ) -> AppResult<()> {
        for product_id in product_ids {
            Self::update_stock(&mut *conn, *product_id).await?;
        }
        Ok(())
    }

    /// Recalculate stock for every live product
    ///
    /// Maintenance/repair path: O(products × ledger rows), not for request
    /// handling. Returns the number of products refreshed.
    pub async fn recalculate_all_stock(conn: &mut PgConnection) -> AppResult<u64> {
        let product_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM products WHERE deleted_at IS NULL ORDER BY created_at",
        )
        .fetch_all(&mut *conn)
        .await?;

        for product_id in &product_ids {
            let stock = Self::update_stock(&mut *conn, *product_id).await?;
            tracing::debug!(%product_id, %stock, "stock recalculated");
        }

        Ok(product_ids.len() as u64)
    }
}
