//! Product catalog service for cached derived fields and product row locking

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Product;

/// Product service for catalog reads and stock-field locking
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub barcode: Option<String>,
    pub unit: Option<String>,
}

/// Stock valuation for a product, priced at CMUP
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockValue {
    pub product_id: Uuid,
    pub name: String,
    pub current_stock_quantity: Decimal,
    pub cmup_cost: Decimal,
    pub stock_value: Decimal,
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Lock a product's cached stock fields for the current transaction
    ///
    /// Returns `(current_stock_quantity, cmup_cost)` as persisted, holding a
    /// row lock until the caller's transaction ends. Every orchestrated
    /// stock/cmup mutation must go through this first so concurrent
    /// purchases and sales against the same product serialize at the
    /// database.
    pub async fn lock_stock_fields(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> AppResult<(Decimal, Decimal)> {
        sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT current_stock_quantity, cmup_cost
            FROM products
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Lock a set of products in ascending id order
    ///
    /// Acquiring locks in a stable order keeps concurrent multi-product
    /// transactions from deadlocking. Doubles as the existence check: a
    /// missing or soft-deleted product aborts with NotFound.
    pub async fn lock_products_in_order(
        conn: &mut PgConnection,
        product_ids: impl Iterator<Item = Uuid>,
    ) -> AppResult<()> {
        let ordered: BTreeSet<Uuid> = product_ids.collect();
        for product_id in &ordered {
            Self::lock_stock_fields(&mut *conn, *product_id).await?;
        }
        Ok(())
    }

    /// Create a product
    pub async fn create(&self, input: CreateProductInput) -> AppResult<Product> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Product name is required".to_string(),
                message_fr: "Le nom du produit est requis".to_string(),
            });
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, barcode, unit)
            VALUES ($1, $2, $3)
            RETURNING id, name, barcode, unit, current_stock_quantity, cmup_cost,
                      created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.barcode)
        .bind(&input.unit)
        .fetch_one(&self.db)
        .await?;

        Ok(product)
    }

    /// List live products with their cached derived fields
    pub async fn list(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, unit, current_stock_quantity, cmup_cost,
                   created_at, updated_at
            FROM products
            WHERE deleted_at IS NULL
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Get a product by id
    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, unit, current_stock_quantity, cmup_cost,
                   created_at, updated_at
            FROM products
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Stock value of a product: cached quantity priced at cached CMUP
    pub async fn get_stock_value(&self, product_id: Uuid) -> AppResult<ProductStockValue> {
        let product = self.get(product_id).await?;

        Ok(ProductStockValue {
            product_id: product.id,
            name: product.name,
            current_stock_quantity: product.current_stock_quantity,
            cmup_cost: product.cmup_cost,
            stock_value: product.current_stock_quantity * product.cmup_cost,
        })
    }
}
