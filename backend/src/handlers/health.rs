//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Readiness report for the API and its database
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub version: &'static str,
    pub database: &'static str,
}

/// Readiness endpoint: verifies the database answers a trivial query
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(err) => {
            tracing::warn!(%err, "health check could not reach the database");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
