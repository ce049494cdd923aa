//! # Data Models
//!
//! This module contains the SeaORM entity models for the Dealflow pipeline
//! tables.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod deal_suggestion;
pub mod event;
pub mod inventory_item;

pub use deal_suggestion::Entity as DealSuggestion;
pub use event::Entity as Event;
pub use inventory_item::Entity as InventoryItem;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "dealflow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
