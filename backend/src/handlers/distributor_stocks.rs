//! HTTP handlers for distributor van-stock endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::DistributorStock;
use crate::services::distributor_stocks::{DistributorStockEntry, SetVanStockInput};
use crate::services::DistributorStockService;
use crate::AppState;

/// List a distributor's van-stock balances
pub async fn list_distributor_stock(
    State(state): State<AppState>,
    Path(distributor_id): Path<Uuid>,
) -> AppResult<Json<Vec<DistributorStockEntry>>> {
    let service = DistributorStockService::new(state.db);
    let entries = service.list_for_distributor(distributor_id).await?;
    Ok(Json(entries))
}

/// Set a van-stock balance to an absolute quantity (manual reconciliation)
pub async fn set_distributor_stock(
    State(state): State<AppState>,
    Path(distributor_id): Path<Uuid>,
    Json(input): Json<SetVanStockInput>,
) -> AppResult<Json<DistributorStock>> {
    let service = DistributorStockService::new(state.db);
    let stock = service.set_quantity(distributor_id, input).await?;
    Ok(Json(stock))
}
