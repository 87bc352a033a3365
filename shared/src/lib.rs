//! Shared types and domain logic for the Distribution Management Platform
//!
//! This crate contains the pure, database-free parts of the system: the
//! stock and weighted-average-cost arithmetic, transaction type enums, and
//! input validation rules shared between the server and maintenance tools.

pub mod costing;
pub mod types;
pub mod validation;

pub use costing::*;
pub use types::*;
pub use validation::*;
