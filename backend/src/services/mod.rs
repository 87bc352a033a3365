//! Business logic services for the Distribution Management Platform

pub mod cmup_calculator;
pub mod cycles;
pub mod distributor_stocks;
pub mod products;
pub mod purchases;
pub mod sales;
pub mod stock_calculator;

pub use cmup_calculator::CmupCalculator;
pub use cycles::CycleService;
pub use distributor_stocks::DistributorStockService;
pub use products::ProductService;
pub use purchases::PurchaseService;
pub use sales::SalesService;
pub use stock_calculator::StockCalculator;

/// Best-effort removal of an uploaded file after a rolled-back transaction
///
/// File storage is outside the database transaction, so cleanup cannot be
/// atomic with the rollback; failures are logged and otherwise ignored.
pub(crate) async fn remove_uploaded_file(path: &str) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::warn!(%path, %err, "failed to remove uploaded file after rollback");
    }
}
