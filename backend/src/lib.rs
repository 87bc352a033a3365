//! Distribution Management Platform - Backend Library
//!
//! Shared between the HTTP server binary and the maintenance CLI.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

pub use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}
