//! HTTP handlers for the Distribution Management Platform

pub mod cycles;
pub mod distributor_stocks;
pub mod health;
pub mod products;
pub mod purchases;
pub mod sales;

pub use cycles::*;
pub use distributor_stocks::*;
pub use health::*;
pub use products::*;
pub use purchases::*;
pub use sales::*;
