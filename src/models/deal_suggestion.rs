//! DealSuggestion entity model
//!
//! This module contains the SeaORM entity model for the deal_suggestions
//! table, together with the typed lifecycle enums driving the publishing
//! state machine.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// How the suggested discount is expressed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Currency amount subtracted from the original price
    #[sea_orm(string_value = "fixed_amount")]
    FixedAmount,
    /// Percentage of the original price
    #[sea_orm(string_value = "percentage")]
    Percentage,
}

/// Vendor approval state, mutated externally by the vendor approval UI.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum VendorFeedback {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Publishing state. Transitions generated -> posted exactly once, by the
/// deal publisher, only for vendor-accepted suggestions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    #[sea_orm(string_value = "generated")]
    Generated,
    #[sea_orm(string_value = "posted")]
    Posted,
}

/// DealSuggestion entity representing an AI-generated deal proposal
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "deal_suggestions")]
pub struct Model {
    /// Unique identifier for the suggestion (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Vendor the suggestion was generated for
    pub vendor_id: String,

    /// Event that triggered the suggestion
    pub event_id: i32,

    /// SKU chosen by the model, validated against the inventory snapshot
    pub suggested_product_sku: String,

    /// Prompt sent to the generative model
    pub deal_details_prompt: String,

    /// Marketing copy proposed by the model
    pub deal_details_suggestion_text: String,

    /// Discount shape (fixed_amount or percentage)
    pub suggested_discount_type: DiscountType,

    /// Discount magnitude (currency amount or percent number)
    pub suggested_discount_value: f64,

    /// Actual inventory price at generation time, never the model's figure
    pub original_price: f64,

    /// Discounted price, always recomputed deterministically
    pub suggested_price: f64,

    /// Name of the model that produced the suggestion
    pub ai_model_name: String,

    /// Raw model output, kept for auditing
    #[sea_orm(column_type = "JsonBinary")]
    pub ai_response_payload: JsonValue,

    /// Vendor approval state (externally mutated)
    pub vendor_feedback: VendorFeedback,

    /// Publishing state
    pub status: SuggestionStatus,

    /// Timestamp when the suggestion was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the suggestion was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
