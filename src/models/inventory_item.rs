//! InventoryItem entity model
//!
//! This module contains the SeaORM entity model for the inventory table.
//! Rows are owned by an external inventory system; the pipeline only reads
//! them when building suggestion context.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Inventory item readable by the suggestion pipeline
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    /// Unique identifier for the inventory row (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Vendor owning this stock
    pub vendor_id: String,

    /// Stock-keeping unit, unique per vendor
    pub sku: String,

    /// Display name of the product
    pub product_name: String,

    /// Free-form product description
    pub description: String,

    /// Current unit price
    pub price: f64,

    /// Units currently in stock
    pub quantity_on_hand: i32,

    /// Product category
    pub category: String,

    /// Supplier name
    pub supplier: String,

    /// Timestamp when the row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the row was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
