//! Migration to create the deal_suggestions table.
//!
//! This migration creates the deal_suggestions table holding AI-generated
//! deal proposals, with the vendor-feedback and status columns that drive
//! the publishing state machine.

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
                    .table(DealSuggestions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealSuggestions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DealSuggestions::VendorId).text().not_null())
                    .col(ColumnDef::new(DealSuggestions::EventId).integer().not_null())
                    .col(
                        ColumnDef::new(DealSuggestions::SuggestedProductSku)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::DealDetailsPrompt)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::DealDetailsSuggestionText)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::SuggestedDiscountType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::SuggestedDiscountValue)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::OriginalPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::SuggestedPrice)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::AiModelName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::AiResponsePayload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::VendorFeedback)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::Status)
                            .text()
                            .not_null()
                            .default("generated"),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DealSuggestions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_suggestions_event_id")
                            .from(DealSuggestions::Table, DealSuggestions::EventId)
                            .to(Events::Table, Events::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for the publisher's accepted-and-not-yet-posted poll
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_deal_suggestions_feedback_status ON deal_suggestions (vendor_feedback, status)".to_string(),
            ))
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_deal_suggestions_vendor ON deal_suggestions (vendor_id, created_at DESC)".to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_deal_suggestions_feedback_status")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_deal_suggestions_vendor").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(DealSuggestions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DealSuggestions {
    Table,
    Id,
    VendorId,
    EventId,
    SuggestedProductSku,
    DealDetailsPrompt,
    DealDetailsSuggestionText,
    SuggestedDiscountType,
    SuggestedDiscountValue,
    OriginalPrice,
    SuggestedPrice,
    AiModelName,
    AiResponsePayload,
    VendorFeedback,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
}
