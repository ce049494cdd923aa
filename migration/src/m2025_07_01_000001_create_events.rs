//! Migration to create the events table.
//!
//! This migration creates the events table which stores vendor-activity
//! proximity signals awaiting deal-suggestion processing, deduplicated by
//! the external activity identifier.

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
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Events::ActivityId)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Events::VendorId).text().not_null())
                    .col(ColumnDef::new(Events::LocationUuid).uuid().not_null())
                    .col(ColumnDef::new(Events::EventTriggerPoint).text().not_null())
                    .col(
                        ColumnDef::new(Events::EventDetailsText)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EventLocationLatitude)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EventLocationLongitude)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EventTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::ProcessedForSuggestion)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Events::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the processor's unprocessed-events poll using raw SQL
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_events_unprocessed ON events (processed_for_suggestion, created_at)".to_string(),
            ))
            .await?;

        // Index for per-vendor event lookups
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_events_vendor ON events (vendor_id, event_timestamp DESC)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_events_unprocessed").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_events_vendor").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    ActivityId,
    VendorId,
    LocationUuid,
    EventTriggerPoint,
    EventDetailsText,
    EventLocationLatitude,
    EventLocationLongitude,
    EventTimestamp,
    ProcessedForSuggestion,
    CreatedAt,
    UpdatedAt,
}
