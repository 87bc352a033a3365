//! CMUP (weighted-average unit cost) calculation service over the purchase ledger

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// Derives and persists `products.cmup_cost`
pub struct CmupCalculator;

impl CmupCalculator {
    /// Weighted-average cost over the product's active purchase lines
    ///
    /// Returns 0 when the product has no active purchase history.
    pub async fn calculate_cmup(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Decimal> {
        let (total_cost, total_quantity) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT COALESCE(SUM(pl.quantity * pl.purchase_price), 0),
                   COALESCE(SUM(pl.quantity), 0)
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

        Ok(shared::weighted_average_cost(total_cost, total_quantity))
    }

    /// Full recompute + persist
    ///
    /// Used whenever purchase lines are removed or replaced (invoice edit,
    /// invoice delete, batch repair): any change the incremental formula
    /// cannot express.
    pub async fn update_cmup(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Decimal> {
        let cmup = Self::calculate_cmup(&mut *conn, product_id).await?;

        sqlx::query("UPDATE products SET cmup_cost = $1, updated_at = NOW() WHERE id = $2")
            .bind(cmup)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

        Ok(cmup)
    }

    /// O(1) update when one new purchase line is added
    ///
    /// `current_stock` and `current_cmup` must be the product's persisted
    /// values read under the caller's row lock *before* this purchase's
    /// stock increment is applied. Running this after the increment
    /// double-counts the new quantity on both sides of the average.
    pub async fn update_cmup_incremental(
        conn: &mut PgConnection,
        product_id: Uuid,
        current_stock: Decimal,
        current_cmup: Decimal,
        new_quantity: Decimal,
        new_price: Decimal,
    ) -> AppResult<Decimal> {
        let cmup =
            shared::incremental_average_cost(current_stock, current_cmup, new_quantity, new_price);

        sqlx::query("UPDATE products SET cmup_cost = $1, updated_at = NOW() WHERE id = $2")
            .bind(cmup)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

        Ok(cmup)
    }

    /// Recompute after a purchase line is removed
    ///
    /// Deliberately a full recompute rather than an algebraic reversal:
    /// subtracting from a weighted average is not numerically reliable when
    /// the intermediate states are unknown, and a single-product recompute
    /// is cheap enough.
    pub async fn reverse_cmup_incremental(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> AppResult<Decimal> {
        Self::update_cmup(conn, product_id).await
    }

    /// Update CMUP for a set of products
    pub async fn update_cmup_for_products(
        conn: &mut PgConnection,
        product_ids: &[Uuid],
    ) -> AppResult<()> {
        for product_id in product_ids {
            Self::update_cmup(&mut *conn, *product_id).await?;
        }
        Ok(())
    }

    /// Recalculate CMUP for every live product, returning the count
    pub async fn recalculate_all_cmup(conn: &mut PgConnection) -> AppResult<u64> {
        let product_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM products WHERE deleted_at IS NULL ORDER BY created_at",
        )
        .fetch_all(&mut *conn)
        .await?;

        for product_id in &product_ids {
            let cmup = Self::update_cmup(&mut *conn, *product_id).await?;
            tracing::debug!(%product_id, %cmup, "cmup recalculated");
        }

        Ok(product_ids.len() as u64)
    }
}
