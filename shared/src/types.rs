//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Price tier applied to a sale line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Wholesale,
    SemiWholesale,
    Retail,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Wholesale => "wholesale",
            PriceType::SemiWholesale => "semi_wholesale",
            PriceType::Retail => "retail",
        }
    }
}

/// Direction of a cycle movement between the central depot and a distributor
///
/// `Load` and `Reload` send goods out of the depot; `Return` brings them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Load,
    Reload,
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Load => "load",
            MovementType::Reload => "reload",
            MovementType::Return => "return",
        }
    }

    /// Whether the movement adds goods back to the central depot
    pub fn is_inbound(&self) -> bool {
        matches!(self, MovementType::Return)
    }
}

/// Lifecycle state of a distributor cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Open,
    Closed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Open => "open",
            CycleStatus::Closed => "closed",
        }
    }
}
