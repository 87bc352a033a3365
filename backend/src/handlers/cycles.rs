//! HTTP handlers for distributor cycle endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CycleMovement, DistributorCycle};
use crate::services::cycles::{
    AddMovementInput, ClosedCycleSummary, CreateCycleInput, CycleWithMovements,
};
use crate::services::CycleService;
use crate::AppState;

/// List cycles
pub async fn list_cycles(State(state): State<AppState>) -> AppResult<Json<Vec<DistributorCycle>>> {
    let service = CycleService::new(state.db);
    let cycles = service.list().await?;
    Ok(Json(cycles))
}

/// Get a cycle with its movements
pub async fn get_cycle(
    State(state): State<AppState>,
    Path(cycle_id): Path<Uuid>,
) -> AppResult<Json<CycleWithMovements>> {
    let service = CycleService::new(state.db);
    let cycle = service.get(cycle_id).await?;
    Ok(Json(cycle))
}

/// Open a new cycle
pub async fn create_cycle(
    State(state): State<AppState>,
    Json(input): Json<CreateCycleInput>,
) -> AppResult<Json<DistributorCycle>> {
    let service = CycleService::new(state.db);
    let cycle = service.create(input).await?;
    Ok(Json(cycle))
}

/// Record a movement on an open cycle
pub async fn add_cycle_movement(
    State(state): State<AppState>,
    Path(cycle_id): Path<Uuid>,
    Json(input): Json<AddMovementInput>,
) -> AppResult<Json<CycleMovement>> {
    let service = CycleService::new(state.db);
    let movement = service.add_movement(cycle_id, input).await?;
    Ok(Json(movement))
}

/// Close a cycle and return its reconciliation summary
pub async fn close_cycle(
    State(state): State<AppState>,
    Path(cycle_id): Path<Uuid>,
) -> AppResult<Json<ClosedCycleSummary>> {
    let service = CycleService::new(state.db);
    let summary = service.close(cycle_id).await?;
    Ok(Json(summary))
}
