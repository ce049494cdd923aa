//! # Deal Suggestion Repository
//!
//! Data access for DealSuggestion rows: persisting generator output, the
//! publisher's accepted-and-not-yet-posted poll, and the one-way posted
//! transition.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::error::RepositoryError;
use crate::models::deal_suggestion::{
    self, Entity as DealSuggestion, Model, SuggestionStatus, VendorFeedback,
};
use crate::suggestion::GeneratedSuggestion;

/// Repository for DealSuggestion database operations
pub struct DealSuggestionRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> DealSuggestionRepository<'a> {
    /// Create a new DealSuggestionRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persist a generated suggestion for an event, with feedback pending
    /// and status generated.
    pub async fn insert_generated(
        &self,
        vendor_id: &str,
        event_id: i32,
        suggestion: &GeneratedSuggestion,
    ) -> Result<Model, RepositoryError> {
        let now = Utc::now();
        let model = deal_suggestion::ActiveModel {
            vendor_id: Set(vendor_id.to_string()),
            event_id: Set(event_id),
            suggested_product_sku: Set(suggestion.suggested_product_sku.clone()),
            deal_details_prompt: Set(suggestion.deal_details_prompt.clone()),
            deal_details_suggestion_text: Set(suggestion.deal_details_suggestion_text.clone()),
            suggested_discount_type: Set(suggestion.suggested_discount_type),
            suggested_discount_value: Set(suggestion.suggested_discount_value),
            original_price: Set(suggestion.original_price),
            suggested_price: Set(suggestion.suggested_price),
            ai_model_name: Set(suggestion.ai_model_name.clone()),
            ai_response_payload: Set(suggestion.ai_response_payload.clone()),
            vendor_feedback: Set(VendorFeedback::Pending),
            status: Set(SuggestionStatus::Generated),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let inserted = model
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        info!(
            suggestion_id = inserted.id,
            event_id,
            sku = %inserted.suggested_product_sku,
            "Deal suggestion stored"
        );

        Ok(inserted)
    }

    /// Suggestions the vendor accepted that have not been republished yet,
    /// oldest first.
    pub async fn list_accepted_unposted(&self) -> Result<Vec<Model>, RepositoryError> {
        DealSuggestion::find()
            .filter(deal_suggestion::Column::VendorFeedback.eq(VendorFeedback::Accepted))
            .filter(deal_suggestion::Column::Status.ne(SuggestionStatus::Posted))
            .order_by_asc(deal_suggestion::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Flip the suggestion to posted. Conditional on the row not already
    /// being posted; returns whether a row actually changed.
    pub async fn mark_posted(&self, id: i32) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let result = DealSuggestion::update_many()
            .col_expr(
                deal_suggestion::Column::Status,
                Expr::value(SuggestionStatus::Posted),
            )
            .col_expr(
                deal_suggestion::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(now)),
            )
            .filter(deal_suggestion::Column::Id.eq(id))
            .filter(deal_suggestion::Column::Status.ne(SuggestionStatus::Posted))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::Activity;
    use crate::models::deal_suggestion::DiscountType;
    use crate::repositories::event::{EventRepository, RecordOutcome};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    async fn insert_event(db: &DatabaseConnection) -> i32 {
        let activity: Activity = serde_json::from_value(serde_json::json!({
            "activity_id": "act-1",
            "activity_title": "Fair",
            "latitude": "27.57",
            "longitude": "77.65"
        }))
        .unwrap();

        let RecordOutcome::Created(event) = EventRepository::new(db)
            .record_event("vendor-1", &activity)
            .await
            .unwrap()
        else {
            panic!("expected creation");
        };
        event.id
    }

    fn generated() -> GeneratedSuggestion {
        GeneratedSuggestion {
            suggested_product_sku: "A".to_string(),
            deal_details_suggestion_text: "Save 20%!".to_string(),
            suggested_discount_type: DiscountType::Percentage,
            suggested_discount_value: 20.0,
            original_price: 100.0,
            suggested_price: 80.0,
            deal_details_prompt: "prompt".to_string(),
            ai_model_name: "gemini-1.5-flash-latest".to_string(),
            ai_response_payload: serde_json::json!({"candidates": []}),
        }
    }

    #[tokio::test]
    async fn inserted_suggestions_default_to_pending_generated() {
        let db = setup_db().await;
        let event_id = insert_event(&db).await;
        let repo = DealSuggestionRepository::new(&db);

        let stored = repo
            .insert_generated("vendor-1", event_id, &generated())
            .await
            .unwrap();

        assert_eq!(stored.vendor_feedback, VendorFeedback::Pending);
        assert_eq!(stored.status, SuggestionStatus::Generated);
        assert_eq!(stored.suggested_price, 80.0);

        // Pending suggestions are never publish candidates
        assert!(repo.list_accepted_unposted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_accepted_unposted_rows_are_publish_candidates() {
        let db = setup_db().await;
        let event_id = insert_event(&db).await;
        let repo = DealSuggestionRepository::new(&db);

        let stored = repo
            .insert_generated("vendor-1", event_id, &generated())
            .await
            .unwrap();

        // Simulate the external vendor approval UI
        let mut active: deal_suggestion::ActiveModel = stored.clone().into();
        active.vendor_feedback = Set(VendorFeedback::Accepted);
        active.update(&db).await.unwrap();

        let candidates = repo.list_accepted_unposted().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, stored.id);

        assert!(repo.mark_posted(stored.id).await.unwrap());
        assert!(repo.list_accepted_unposted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_posted_is_conditional() {
        let db = setup_db().await;
        let event_id = insert_event(&db).await;
        let repo = DealSuggestionRepository::new(&db);

        let stored = repo
            .insert_generated("vendor-1", event_id, &generated())
            .await
            .unwrap();

        assert!(repo.mark_posted(stored.id).await.unwrap());
        // Already posted: no row changes
        assert!(!repo.mark_posted(stored.id).await.unwrap());
    }

    #[tokio::test]
    async fn rejected_suggestions_are_not_candidates() {
        let db = setup_db().await;
        let event_id = insert_event(&db).await;
        let repo = DealSuggestionRepository::new(&db);

        let stored = repo
            .insert_generated("vendor-1", event_id, &generated())
            .await
            .unwrap();

        let mut active: deal_suggestion::ActiveModel = stored.into();
        active.vendor_feedback = Set(VendorFeedback::Rejected);
        active.update(&db).await.unwrap();

        assert!(repo.list_accepted_unposted().await.unwrap().is_empty());
    }
}
