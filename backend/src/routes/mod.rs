//! Route definitions for the Distribution Management Platform

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Product catalog
        .nest("/products", product_routes())
        // Purchase invoices
        .nest("/purchases", purchase_routes())
        // Sales receipts
        .nest("/sales", sales_routes())
        // Individual payments are addressed outside the receipt tree
        .route("/sales-payments/:payment_id", delete(handlers::delete_sale_payment))
        // Distributor cycles
        .nest("/cycles", cycle_routes())
        // Distributor van stock
        .nest("/distributor-stocks", distributor_stock_routes())
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:product_id", get(handlers::get_product))
        .route("/:product_id/stock-value", get(handlers::get_product_stock_value))
}

/// Purchase invoice routes
fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_purchases).post(handlers::create_purchase))
        .route("/next-number", get(handlers::next_invoice_number))
        .route(
            "/:invoice_id",
            get(handlers::get_purchase)
                .put(handlers::update_purchase)
                .delete(handlers::delete_purchase),
        )
}

/// Sales receipt routes
fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/next-number", get(handlers::next_receipt_number))
        .route(
            "/:receipt_id",
            get(handlers::get_sale)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
        .route("/:receipt_id/payments", post(handlers::add_sale_payment))
}

/// Distributor cycle routes
fn cycle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_cycles).post(handlers::create_cycle))
        .route("/:cycle_id", get(handlers::get_cycle))
        .route("/:cycle_id/movements", post(handlers::add_cycle_movement))
        .route("/:cycle_id/close", post(handlers::close_cycle))
}

/// Distributor van-stock routes
fn distributor_stock_routes() -> Router<AppState> {
    Router::new().route(
        "/:distributor_id",
        get(handlers::list_distributor_stock).put(handlers::set_distributor_stock),
    )
}
