//! Event entity model
//!
//! This module contains the SeaORM entity model for the events table, which
//! stores vendor-activity proximity signals awaiting suggestion processing.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Event entity representing a detected vendor-activity proximity signal
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Unique identifier for the event (primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// External marketplace activity identifier, unique per event (dedup key)
    #[sea_orm(unique)]
    pub activity_id: String,

    /// Vendor the event was detected for
    pub vendor_id: String,

    /// Fresh identifier minted for the matched location
    pub location_uuid: Uuid,

    /// Category tag describing what triggered the event (e.g. local_event)
    pub event_trigger_point: String,

    /// Structured details payload: title, location, dates, category, and
    /// the full source-activity snapshot
    #[sea_orm(column_type = "JsonBinary")]
    pub event_details_text: JsonValue,

    /// Latitude of the matched activity location
    pub event_location_latitude: f64,

    /// Longitude of the matched activity location
    pub event_location_longitude: f64,

    /// Timestamp when the event was detected
    pub event_timestamp: DateTimeWithTimeZone,

    /// Whether the event has been driven through suggestion generation.
    /// Transitions false -> true exactly once; never reverts.
    pub processed_for_suggestion: bool,

    /// Timestamp when the event was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the event was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::deal_suggestion::Entity")]
    DealSuggestion,
}

impl Related<super::deal_suggestion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DealSuggestion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Shape of the `event_details_text` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub category: Option<String>,
    /// Full raw activity snapshot as received from the marketplace
    pub activity_details_json: JsonValue,
}
