//! Distributor van-stock service for stock review and manual reconciliation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::DistributorStock;

/// Van-stock service
#[derive(Clone)]
pub struct DistributorStockService {
    db: PgPool,
}

/// Van-stock balance with the product name for display
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DistributorStockEntry {
    pub id: Uuid,
    pub distributor_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
}

/// Input for a manual van-stock adjustment
#[derive(Debug, Deserialize)]
pub struct SetVanStockInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

impl DistributorStockService {
    /// Create a new DistributorStockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List a distributor's van-stock balances
    pub async fn list_for_distributor(
        &self,
        distributor_id: Uuid,
    ) -> AppResult<Vec<DistributorStockEntry>> {
        let distributor_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM distributors WHERE id = $1)")
                .bind(distributor_id)
                .fetch_one(&self.db)
                .await?;
        if !distributor_exists {
            return Err(AppError::NotFound("Distributor".to_string()));
        }

        let entries = sqlx::query_as::<_, DistributorStockEntry>(
            r#"
            SELECT ds.id, ds.distributor_id, ds.product_id, p.name AS product_name, ds.quantity
            FROM distributor_stocks ds
            JOIN products p ON p.id = ds.product_id
            WHERE ds.distributor_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(distributor_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Set a van-stock balance to an absolute quantity (manual reconciliation)
    pub async fn set_quantity(
        &self,
        distributor_id: Uuid,
        input: SetVanStockInput,
    ) -> AppResult<DistributorStock> {
        if input.quantity < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity cannot be negative".to_string(),
                message_fr: "La quantité ne peut pas être négative".to_string(),
            });
        }

        let distributor_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM distributors WHERE id = $1)")
                .bind(distributor_id)
                .fetch_one(&self.db)
                .await?;
        if !distributor_exists {
            return Err(AppError::NotFound("Distributor".to_string()));
        }

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;
        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let stock = sqlx::query_as::<_, DistributorStock>(
            r#"
            INSERT INTO distributor_stocks (distributor_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (distributor_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            RETURNING id, distributor_id, product_id, quantity, created_at, updated_at
            "#,
        )
        .bind(distributor_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .fetch_one(&self.db)
        .await?;

        Ok(stock)
    }
}
