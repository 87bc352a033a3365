//! HTTP handlers for purchase invoice endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::purchases::{PurchaseInvoiceInput, PurchaseInvoiceWithLines};
use crate::services::PurchaseService;
use crate::AppState;

/// List purchase invoices with their lines
pub async fn list_purchases(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PurchaseInvoiceWithLines>>> {
    let service = PurchaseService::new(state.db);
    let invoices = service.list().await?;
    Ok(Json(invoices))
}

/// Get a purchase invoice
pub async fn get_purchase(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<PurchaseInvoiceWithLines>> {
    let service = PurchaseService::new(state.db);
    let invoice = service.get(invoice_id).await?;
    Ok(Json(invoice))
}

/// Create a purchase invoice
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(input): Json<PurchaseInvoiceInput>,
) -> AppResult<Json<PurchaseInvoiceWithLines>> {
    let service = PurchaseService::new(state.db);
    let invoice = service.create(input).await?;
    Ok(Json(invoice))
}

/// Replace a purchase invoice's header and lines
pub async fn update_purchase(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<PurchaseInvoiceInput>,
) -> AppResult<Json<PurchaseInvoiceWithLines>> {
    let service = PurchaseService::new(state.db);
    let invoice = service.update(invoice_id, input).await?;
    Ok(Json(invoice))
}

/// Soft-delete a purchase invoice
pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = PurchaseService::new(state.db);
    service.delete(invoice_id).await?;
    Ok(Json(()))
}

/// Response for the next free invoice number
#[derive(Debug, Serialize)]
pub struct NextInvoiceNumberResponse {
    pub invoice_number: String,
}

/// Get the next free invoice number for the current year
pub async fn next_invoice_number(
    State(state): State<AppState>,
) -> AppResult<Json<NextInvoiceNumberResponse>> {
    let service = PurchaseService::new(state.db);
    let invoice_number = service.next_invoice_number(Utc::now().year()).await?;
    Ok(Json(NextInvoiceNumberResponse { invoice_number }))
}
