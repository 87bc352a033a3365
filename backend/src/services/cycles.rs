//! Distributor cycle service for load/reload/return movements and reconciliation

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{CycleMovement, DistributorCycle};
use crate::services::ProductService;
use shared::{CycleStatus, MovementType};

/// Distributor cycle service
#[derive(Clone)]
pub struct CycleService {
    db: PgPool,
}

/// Input for opening a cycle
#[derive(Debug, Deserialize)]
pub struct CreateCycleInput {
    pub distributor_id: Uuid,
    pub start_date: NaiveDate,
}

/// Input for recording a movement on an open cycle
#[derive(Debug, Deserialize)]
pub struct AddMovementInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub movement_type: MovementType,
    pub movement_date: Option<NaiveDate>,
}

/// Cycle header with its movements
#[derive(Debug, Clone, Serialize)]
pub struct CycleWithMovements {
    #[serde(flatten)]
    pub cycle: DistributorCycle,
    pub movements: Vec<CycleMovement>,
}

/// Quantities reconciled when a cycle closes
#[derive(Debug, Clone, Serialize)]
pub struct CycleReconciliation {
    pub total_loaded: Decimal,
    pub total_returned: Decimal,
    pub total_sold: Decimal,
    /// loaded − returned − sold: what the distributor should still hold
    pub expected_balance: Decimal,
}

/// Result of closing a cycle
#[derive(Debug, Clone, Serialize)]
pub struct ClosedCycleSummary {
    pub cycle: DistributorCycle,
    pub reconciliation: CycleReconciliation,
}

impl CycleService {
    /// Create a new CycleService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Open a new cycle for a distributor
    pub async fn create(&self, input: CreateCycleInput) -> AppResult<DistributorCycle> {
        let distributor_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM distributors WHERE id = $1)")
                .bind(input.distributor_id)
                .fetch_one(&self.db)
                .await?;
        if !distributor_exists {
            return Err(AppError::NotFound("Distributor".to_string()));
        }

        let cycle = sqlx::query_as::<_, DistributorCycle>(
            r#"
            INSERT INTO distributor_cycles (distributor_id, start_date, status)
            VALUES ($1, $2, $3)
            RETURNING id, distributor_id, start_date, end_date, status, created_at, updated_at
            "#,
        )
        .bind(input.distributor_id)
        .bind(input.start_date)
        .bind(CycleStatus::Open.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(cycle)
    }

    /// List cycles, newest first
    pub async fn list(&self) -> AppResult<Vec<DistributorCycle>> {
        let cycles = sqlx::query_as::<_, DistributorCycle>(
            r#"
            SELECT id, distributor_id, start_date, end_date, status, created_at, updated_at
            FROM distributor_cycles
            ORDER BY start_date DESC, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(cycles)
    }

    /// Get a cycle with its movements
    pub async fn get(&self, cycle_id: Uuid) -> AppResult<CycleWithMovements> {
        let cycle = self.get_header(cycle_id).await?;

        let movements = sqlx::query_as::<_, CycleMovement>(
            r#"
            SELECT id, cycle_id, product_id, quantity, movement_type, movement_date, created_at
            FROM cycle_movements
            WHERE cycle_id = $1 AND deleted_at IS NULL
            ORDER BY movement_date, created_at
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.db)
        .await?;

        Ok(CycleWithMovements { cycle, movements })
    }

    /// Record a load/reload/return movement on an open cycle
    ///
    /// The central cached stock is adjusted by the movement's delta in the
    /// same transaction, under a product row lock.
    pub async fn add_movement(
        &self,
        cycle_id: Uuid,
        input: AddMovementInput,
    ) -> AppResult<CycleMovement> {
        let cycle = self.get_header(cycle_id).await?;
        if cycle.status == CycleStatus::Closed.as_str() {
            return Err(AppError::InvalidStateTransition(
                "Cannot add movements to a closed cycle".to_string(),
            ));
        }

        shared::validate_quantity(input.quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
            message_fr: "La quantité doit être supérieure à zéro".to_string(),
        })?;

        let movement_date = input
            .movement_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;

        ProductService::lock_stock_fields(&mut tx, input.product_id).await?;

        let movement = sqlx::query_as::<_, CycleMovement>(
            r#"
            INSERT INTO cycle_movements (cycle_id, product_id, quantity, movement_type, movement_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, cycle_id, product_id, quantity, movement_type, movement_date, created_at
            "#,
        )
        .bind(cycle_id)
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(input.movement_type.as_str())
        .bind(movement_date)
        .fetch_one(&mut *tx)
        .await?;

        let delta = if input.movement_type.is_inbound() {
            input.quantity
        } else {
            -input.quantity
        };
        sqlx::query(
            r#"
            UPDATE products
            SET current_stock_quantity = current_stock_quantity + $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(delta)
        .bind(input.product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(movement)
    }

    /// Close a cycle and report the reconciliation totals
    pub async fn close(&self, cycle_id: Uuid) -> AppResult<ClosedCycleSummary> {
        let cycle = self.get_header(cycle_id).await?;
        if cycle.status == CycleStatus::Closed.as_str() {
            return Err(AppError::InvalidStateTransition(
                "Cycle is already closed".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let total_loaded = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM cycle_movements
            WHERE cycle_id = $1 AND movement_type IN ('load', 'reload') AND deleted_at IS NULL
            "#,
        )
        .bind(cycle_id)
        .fetch_one(&mut *tx)
        .await?;

        let total_returned = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM cycle_movements
            WHERE cycle_id = $1 AND movement_type = 'return' AND deleted_at IS NULL
            "#,
        )
        .bind(cycle_id)
        .fetch_one(&mut *tx)
        .await?;

        // Receipts do not reference cycles directly: the cycle's sales are the
        // distributor's sales since the cycle opened.
        let total_sold = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(sl.quantity + sl.promo_quantity), 0)
            FROM sale_lines sl
            JOIN sales_receipts sr ON sr.id = sl.receipt_id
            WHERE sr.distributor_id = $1
              AND sr.receipt_date >= $2
              AND sl.deleted_at IS NULL
              AND sr.deleted_at IS NULL
            "#,
        )
        .bind(cycle.distributor_id)
        .bind(cycle.start_date)
        .fetch_one(&mut *tx)
        .await?;

        let cycle = sqlx::query_as::<_, DistributorCycle>(
            r#"
            UPDATE distributor_cycles
            SET status = $1, end_date = CURRENT_DATE, updated_at = NOW()
            WHERE id = $2
            RETURNING id, distributor_id, start_date, end_date, status, created_at, updated_at
            "#,
        )
        .bind(CycleStatus::Closed.as_str())
        .bind(cycle_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ClosedCycleSummary {
            cycle,
            reconciliation: CycleReconciliation {
                total_loaded,
                total_returned,
                total_sold,
                expected_balance: total_loaded - total_returned - total_sold,
            },
        })
    }

    async fn get_header(&self, cycle_id: Uuid) -> AppResult<DistributorCycle> {
        sqlx::query_as::<_, DistributorCycle>(
            r#"
            SELECT id, distributor_id, start_date, end_date, status, created_at, updated_at
            FROM distributor_cycles
            WHERE id = $1
            "#,
        )
        .bind(cycle_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle".to_string()))
    }
}
