//! # Event Repository
//!
//! Data access for Event rows: idempotent event recording deduplicated by
//! the external activity id, the unprocessed-events poll used by the event
//! processor, and the one-way processed flag transition.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::marketplace::Activity;
use crate::models::event::{self, Entity as Event, EventDetails, Model};

/// Trigger tag stamped on events created from marketplace activities.
const LOCAL_EVENT_TRIGGER: &str = "local_event";

/// Outcome of an idempotent event write.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// A new event row was written.
    Created(Model),
    /// An event for this activity already exists; nothing was written.
    Skipped,
}

/// Repository for Event database operations
pub struct EventRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> EventRepository<'a> {
    /// Create a new EventRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Record a vendor-activity proximity match as an event.
    ///
    /// Idempotent on `activity_id`: an existing event short-circuits to
    /// [`RecordOutcome::Skipped`]. Activities with non-numeric coordinates
    /// are rejected without writing anything.
    pub async fn record_event(
        &self,
        vendor_id: &str,
        activity: &Activity,
    ) -> Result<RecordOutcome, RepositoryError> {
        let existing = Event::find()
            .filter(event::Column::ActivityId.eq(&activity.activity_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if existing.is_some() {
            debug!(
                activity_id = %activity.activity_id,
                "Event for activity already exists, skipping"
            );
            return Ok(RecordOutcome::Skipped);
        }

        let (latitude, longitude) = activity.coordinates().ok_or_else(|| {
            RepositoryError::InvalidCoordinates(format!(
                "activity {} has non-numeric coordinates '{}','{}'",
                activity.activity_id, activity.latitude, activity.longitude
            ))
        })?;

        let details = EventDetails {
            title: activity.activity_title.clone(),
            location: activity.location.clone(),
            start_date: activity.start_date.clone(),
            end_date: activity.end_date.clone(),
            category: activity.category().map(str::to_string),
            activity_details_json: serde_json::to_value(activity)?,
        };

        let now = Utc::now();
        let model = event::ActiveModel {
            activity_id: Set(activity.activity_id.clone()),
            vendor_id: Set(vendor_id.to_string()),
            location_uuid: Set(Uuid::new_v4()),
            event_trigger_point: Set(LOCAL_EVENT_TRIGGER.to_string()),
            event_details_text: Set(serde_json::to_value(&details)?),
            event_location_latitude: Set(latitude),
            event_location_longitude: Set(longitude),
            event_timestamp: Set(now.into()),
            processed_for_suggestion: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        match model.insert(&txn).await {
            Ok(inserted) => {
                txn.commit().await.map_err(RepositoryError::database_error)?;
                info!(
                    event_id = inserted.id,
                    activity_id = %inserted.activity_id,
                    vendor_id = %inserted.vendor_id,
                    "Event stored"
                );
                Ok(RecordOutcome::Created(inserted))
            }
            Err(err) if is_unique_violation(&err) => {
                // Raced with another writer on the activity_id key
                txn.rollback()
                    .await
                    .map_err(RepositoryError::database_error)?;
                debug!(
                    activity_id = %activity.activity_id,
                    "Concurrent insert for activity, skipping"
                );
                Ok(RecordOutcome::Skipped)
            }
            Err(err) => {
                txn.rollback()
                    .await
                    .map_err(RepositoryError::database_error)?;
                Err(RepositoryError::database_error(err))
            }
        }
    }

    /// All events still awaiting suggestion processing, oldest first.
    pub async fn find_unprocessed(&self) -> Result<Vec<Model>, RepositoryError> {
        Event::find()
            .filter(event::Column::ProcessedForSuggestion.eq(false))
            .order_by_asc(event::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Load one event by id.
    pub async fn find_by_id(&self, id: i32) -> Result<Option<Model>, RepositoryError> {
        Event::find_by_id(id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Flip the processed flag. One-way: only rows still unprocessed are
    /// touched, so the flag never reverts.
    pub async fn mark_processed(&self, id: i32) -> Result<(), RepositoryError> {
        let now = Utc::now();
        Event::update_many()
            .col_expr(
                event::Column::ProcessedForSuggestion,
                sea_orm::sea_query::Expr::value(true),
            )
            .col_expr(
                event::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
            )
            .filter(event::Column::Id.eq(id))
            .filter(event::Column::ProcessedForSuggestion.eq(false))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }
}

fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code = code.as_ref();
        code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    fn activity(activity_id: &str) -> Activity {
        serde_json::from_value(serde_json::json!({
            "activity_id": activity_id,
            "activity_title": "Temple Fair",
            "activity_category": {"actv_category": "Social Gatherings"},
            "start_date": "2025-04-29",
            "start_time": "13:00:00",
            "end_date": "2025-04-30",
            "end_time": "18:00:00",
            "latitude": "27.574719",
            "longitude": "77.652463",
            "location": "Vrindavan"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn record_event_is_idempotent() {
        let db = setup_db().await;
        let repo = EventRepository::new(&db);
        let act = activity("act-1");

        let first = repo.record_event("vendor-1", &act).await.unwrap();
        assert!(matches!(first, RecordOutcome::Created(_)));

        let second = repo.record_event("vendor-1", &act).await.unwrap();
        assert_eq!(second, RecordOutcome::Skipped);

        let stored = repo.find_unprocessed().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_trigger_point, "local_event");
    }

    #[tokio::test]
    async fn record_event_rejects_bad_coordinates() {
        let db = setup_db().await;
        let repo = EventRepository::new(&db);

        let mut act = activity("act-bad");
        act.latitude = "north-ish".to_string();

        let result = repo.record_event("vendor-1", &act).await;
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidCoordinates(_))
        ));
        assert!(repo.find_unprocessed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_event_captures_details_payload() {
        let db = setup_db().await;
        let repo = EventRepository::new(&db);

        let RecordOutcome::Created(stored) =
            repo.record_event("vendor-1", &activity("act-2")).await.unwrap()
        else {
            panic!("expected creation");
        };

        let details: EventDetails =
            serde_json::from_value(stored.event_details_text.clone()).unwrap();
        assert_eq!(details.title, "Temple Fair");
        assert_eq!(details.category.as_deref(), Some("Social Gatherings"));
        assert_eq!(
            details
                .activity_details_json
                .get("activity_id")
                .and_then(|v| v.as_str()),
            Some("act-2")
        );
    }

    #[tokio::test]
    async fn mark_processed_transitions_once() {
        let db = setup_db().await;
        let repo = EventRepository::new(&db);

        let RecordOutcome::Created(stored) =
            repo.record_event("vendor-1", &activity("act-3")).await.unwrap()
        else {
            panic!("expected creation");
        };

        repo.mark_processed(stored.id).await.unwrap();
        assert!(repo.find_unprocessed().await.unwrap().is_empty());

        // Second call is a no-op
        repo.mark_processed(stored.id).await.unwrap();
        let reloaded = repo.find_by_id(stored.id).await.unwrap().unwrap();
        assert!(reloaded.processed_for_suggestion);
    }
}
