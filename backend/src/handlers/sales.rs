//! HTTP handlers for sales receipt endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::SalesPayment;
use crate::services::sales::{
    AddPaymentInput, ListSalesFilter, SalesReceiptInput, SalesReceiptWithLines,
};
use crate::services::SalesService;
use crate::AppState;

/// List sales receipts, optionally filtered by distributor
pub async fn list_sales(
    State(state): State<AppState>,
    Query(filter): Query<ListSalesFilter>,
) -> AppResult<Json<Vec<SalesReceiptWithLines>>> {
    let service = SalesService::new(state.db);
    let receipts = service.list(filter).await?;
    Ok(Json(receipts))
}

/// Get a sales receipt
pub async fn get_sale(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<SalesReceiptWithLines>> {
    let service = SalesService::new(state.db);
    let receipt = service.get(receipt_id).await?;
    Ok(Json(receipt))
}

/// Create a sales receipt
pub async fn create_sale(
    State(state): State<AppState>,
    Json(input): Json<SalesReceiptInput>,
) -> AppResult<Json<SalesReceiptWithLines>> {
    let service = SalesService::new(state.db);
    let receipt = service.create(input).await?;
    Ok(Json(receipt))
}

/// Replace a sales receipt's header and lines
pub async fn update_sale(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(input): Json<SalesReceiptInput>,
) -> AppResult<Json<SalesReceiptWithLines>> {
    let service = SalesService::new(state.db);
    let receipt = service.update(receipt_id, input).await?;
    Ok(Json(receipt))
}

/// Soft-delete a sales receipt
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = SalesService::new(state.db);
    service.delete(receipt_id).await?;
    Ok(Json(()))
}

/// Record a payment against a receipt
pub async fn add_sale_payment(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(input): Json<AddPaymentInput>,
) -> AppResult<Json<SalesPayment>> {
    let service = SalesService::new(state.db);
    let payment = service.add_payment(receipt_id, input).await?;
    Ok(Json(payment))
}

/// Soft-delete a single payment
pub async fn delete_sale_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = SalesService::new(state.db);
    service.delete_payment(payment_id).await?;
    Ok(Json(()))
}

/// Response for the next free receipt number
#[derive(Debug, Serialize)]
pub struct NextReceiptNumberResponse {
    pub receipt_number: String,
}

/// Get the next free receipt number for the current year
pub async fn next_receipt_number(
    State(state): State<AppState>,
) -> AppResult<Json<NextReceiptNumberResponse>> {
    let service = SalesService::new(state.db);
    let receipt_number = service.next_receipt_number(Utc::now().year()).await?;
    Ok(Json(NextReceiptNumberResponse { receipt_number }))
}
