//! Migration to create the inventory table.
//!
//! This migration creates the inventory table which holds per-vendor stock
//! the suggestion pipeline reads from. Rows are owned by an external
//! inventory system; the pipeline never writes them.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Inventory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inventory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Inventory::VendorId).text().not_null())
                    .col(ColumnDef::new(Inventory::Sku).text().not_null())
                    .col(ColumnDef::new(Inventory::ProductName).text().not_null())
                    .col(ColumnDef::new(Inventory::Description).text().not_null())
                    .col(ColumnDef::new(Inventory::Price).double().not_null())
                    .col(
                        ColumnDef::new(Inventory::QuantityOnHand)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Inventory::Category).text().not_null())
                    .col(ColumnDef::new(Inventory::Supplier).text().not_null())
                    .col(
                        ColumnDef::new(Inventory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Inventory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // SKUs are unique per vendor, not globally
        manager
            .create_index(
                Index::create()
                    .name("idx_inventory_vendor_sku")
                    .table(Inventory::Table)
                    .col(Inventory::VendorId)
                    .col(Inventory::Sku)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_inventory_vendor ON inventory (vendor_id)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_inventory_vendor_sku").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_inventory_vendor").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Inventory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Inventory {
    Table,
    Id,
    VendorId,
    Sku,
    ProductName,
    Description,
    Price,
    QuantityOnHand,
    Category,
    Supplier,
    CreatedAt,
    UpdatedAt,
}
