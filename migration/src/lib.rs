//! Database migrations for the Dealflow agents.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_07_01_000001_create_events;
mod m2025_07_01_000002_create_inventory;
mod m2025_07_01_000003_create_deal_suggestions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_07_01_000001_create_events::Migration),
            Box::new(m2025_07_01_000002_create_inventory::Migration),
            Box::new(m2025_07_01_000003_create_deal_suggestions::Migration),
        ]
    }
}
