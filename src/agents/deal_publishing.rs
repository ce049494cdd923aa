//! # Deal Publishing Agent
//!
//! Polls for vendor-accepted suggestions that have not been republished,
//! assembles the marketplace deal-creation payload from the suggestion, its
//! source event, the inventory item, and the vendor's address breakdown,
//! and marks the suggestion posted after a successful creation call.
//!
//! If the publish call succeeds but the status update fails, the next cycle
//! can create a duplicate deal. Known limitation of the status-flag-only
//! scheme.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::agents::jittered;
use crate::config::AgentsConfig;
use crate::error::RepositoryError;
use crate::marketplace::{
    Activity, CreateDealRequest, DealImage, MarketplaceClient, VendorDetails,
};
use crate::models::event::EventDetails;
use crate::models::{deal_suggestion, event, inventory_item};
use crate::repositories::{DealSuggestionRepository, EventRepository, InventoryRepository};

type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Background agent republishing accepted suggestions as live deals.
pub struct DealPublishingAgent {
    db: Arc<DatabaseConnection>,
    marketplace: Arc<MarketplaceClient>,
    config: AgentsConfig,
}

/// Counters for one publishing cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub posted: u64,
    pub failed: u64,
}

impl DealPublishingAgent {
    /// Create a new agent instance.
    pub fn new(
        db: Arc<DatabaseConnection>,
        marketplace: Arc<MarketplaceClient>,
        config: AgentsConfig,
    ) -> Self {
        Self {
            db,
            marketplace,
            config,
        }
    }

    /// Run the agent loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting deal publishing agent");
        let interval = Duration::from_secs(self.config.publishing_interval_seconds);

        loop {
            let tick_started = Instant::now();
            match self.tick().await {
                Ok(report) => {
                    debug!(
                        posted = report.posted,
                        failed = report.failed,
                        "Deal publishing cycle completed"
                    );
                    counter!("deal_publishing_posted_total").increment(report.posted);
                    counter!("deal_publishing_failed_total").increment(report.failed);
                }
                Err(err) => {
                    error!(error = ?err, "Deal publishing cycle failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(Duration::from_secs(self.config.error_backoff_seconds)) => {}
                    }
                }
            }
            histogram!("deal_publishing_cycle_duration_ms")
                .record(tick_started.elapsed().as_secs_f64() * 1_000.0);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(jittered(interval, self.config.jitter_pct_max)) => {}
            }
        }

        info!("Deal publishing agent stopped");
    }

    /// One polling cycle over all accepted, not-yet-posted suggestions.
    pub async fn tick(&self) -> Result<PublishReport, RepositoryError> {
        let mut report = PublishReport::default();

        let candidates = DealSuggestionRepository::new(&self.db)
            .list_accepted_unposted()
            .await?;

        if candidates.is_empty() {
            debug!("No accepted suggestions awaiting publication");
            return Ok(report);
        }

        info!(count = candidates.len(), "Publishing accepted suggestions");

        for suggestion in &candidates {
            match self.publish_one(suggestion).await {
                Ok(deal_uuid) => {
                    report.posted += 1;
                    info!(
                        suggestion_id = suggestion.id,
                        deal_uuid = deal_uuid.as_deref().unwrap_or("unknown"),
                        "Deal published"
                    );
                }
                Err(err) => {
                    // Status untouched; retried next cycle
                    report.failed += 1;
                    error!(
                        suggestion_id = suggestion.id,
                        vendor_id = %suggestion.vendor_id,
                        error = %err,
                        "Failed to publish suggestion"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn publish_one(
        &self,
        suggestion: &deal_suggestion::Model,
    ) -> Result<Option<String>, PublishError> {
        let event = EventRepository::new(&self.db)
            .find_by_id(suggestion.event_id)
            .await?
            .ok_or_else(|| format!("event {} not found", suggestion.event_id))?;

        let item = InventoryRepository::new(&self.db)
            .find_by_sku(&suggestion.vendor_id, &suggestion.suggested_product_sku)
            .await?
            .ok_or_else(|| {
                format!(
                    "inventory item '{}' for vendor {} not found",
                    suggestion.suggested_product_sku, suggestion.vendor_id
                )
            })?;

        let vendor = self.marketplace.vendor_details(&suggestion.vendor_id).await?;

        let request = build_deal_request(suggestion, &event, &item, &vendor)?;
        let response = self.marketplace.create_deal(&request).await?;

        let marked = DealSuggestionRepository::new(&self.db)
            .mark_posted(suggestion.id)
            .await?;
        if !marked {
            warn!(
                suggestion_id = suggestion.id,
                "Suggestion was already posted when updating status"
            );
        }

        Ok(response.data.and_then(|data| data.deal_uuid))
    }
}

/// Assemble the deal-creation payload from the pipeline's stored state.
fn build_deal_request(
    suggestion: &deal_suggestion::Model,
    event: &event::Model,
    item: &inventory_item::Model,
    vendor: &VendorDetails,
) -> Result<CreateDealRequest, PublishError> {
    let details: EventDetails = serde_json::from_value(event.event_details_text.clone())?;

    // The stored snapshot carries the activity's time window and images.
    let activity: Option<Activity> =
        serde_json::from_value(details.activity_details_json.clone()).ok();

    let uploaded_images = activity
        .as_ref()
        .map(|a| {
            a.uploaded_images
                .iter()
                .map(|url| DealImage {
                    thumbnail: url.clone(),
                    compressed: url.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let address = vendor.addresses.first();

    Ok(CreateDealRequest {
        deal_title: format!("{} Deal", item.product_name),
        deal_description: suggestion.deal_details_suggestion_text.clone(),
        select_service: item.category.clone(),
        uploaded_images,
        start_date: details.start_date.clone(),
        end_date: details.end_date.clone(),
        start_time: normalize_time(activity.as_ref().map(|a| a.start_time.as_str())),
        end_time: normalize_time(activity.as_ref().map(|a| a.end_time.as_str())),
        start_now: "true".to_string(),
        actual_price: format!("{:.2}", suggestion.original_price),
        deal_price: format!("{:.2}", suggestion.suggested_price),
        available_deals: item.quantity_on_hand.to_string(),
        location_house_no: address
            .and_then(|a| a.house_no_building_name.clone())
            .unwrap_or_default(),
        location_road_name: address
            .and_then(|a| a.road_name_area_colony.clone())
            .unwrap_or_default(),
        location_country: address.and_then(|a| a.country.clone()).unwrap_or_default(),
        location_state: address.and_then(|a| a.state.clone()).unwrap_or_default(),
        location_city: address.and_then(|a| a.city.clone()).unwrap_or_default(),
        location_pincode: address.and_then(|a| a.pincode.clone()).unwrap_or_default(),
        vendor_kyc: suggestion.vendor_id.clone(),
        latitude: event.event_location_latitude,
        longitude: event.event_location_longitude,
    })
}

/// Trim fractional seconds from marketplace time strings (HH:MM:SS.ffffff).
fn normalize_time(time: Option<&str>) -> String {
    match time.map(|t| t.split('.').next().unwrap_or(t)).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => "00:00:00".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deal_suggestion::{DiscountType, SuggestionStatus, VendorFeedback};
    use crate::repositories::event::RecordOutcome;
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, EntityTrait, Set};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    async fn seed_pipeline(db: &DatabaseConnection, feedback: VendorFeedback) -> i32 {
        let activity: Activity = serde_json::from_value(serde_json::json!({
            "activity_id": "act-1",
            "activity_title": "Weekend Market",
            "uploaded_images": ["https://cdn.example/img.webp"],
            "start_date": "2025-11-22",
            "start_time": "09:00:00.123456",
            "end_date": "2025-11-23",
            "end_time": "19:00:00",
            "latitude": "12.9716",
            "longitude": "77.5946",
            "location": "Bangalore"
        }))
        .unwrap();

        let RecordOutcome::Created(event) = EventRepository::new(db)
            .record_event("vendor-1", &activity)
            .await
            .unwrap()
        else {
            panic!("expected creation");
        };

        let now = Utc::now();
        crate::models::inventory_item::ActiveModel {
            vendor_id: Set("vendor-1".to_string()),
            sku: Set("UMB-1".to_string()),
            product_name: Set("Large Umbrella".to_string()),
            description: Set("Sturdy".to_string()),
            price: Set(600.0),
            quantity_on_hand: Set(25),
            category: Set("Accessories".to_string()),
            supplier: Set("Acme".to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        let stored = deal_suggestion::ActiveModel {
            vendor_id: Set("vendor-1".to_string()),
            event_id: Set(event.id),
            suggested_product_sku: Set("UMB-1".to_string()),
            deal_details_prompt: Set("prompt".to_string()),
            deal_details_suggestion_text: Set("Half price umbrellas!".to_string()),
            suggested_discount_type: Set(DiscountType::FixedAmount),
            suggested_discount_value: Set(300.0),
            original_price: Set(600.0),
            suggested_price: Set(300.0),
            ai_model_name: Set("gemini-1.5-flash-latest".to_string()),
            ai_response_payload: Set(serde_json::json!({})),
            vendor_feedback: Set(feedback),
            status: Set(SuggestionStatus::Generated),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        stored.id
    }

    async fn mock_vendor_details(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/vendor/details/vendor-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vendor_id": "vendor-1",
                "addresses": [{
                    "house_no_building_name": "Shop 7",
                    "road_name_area_colony": "MG Road",
                    "country": "India",
                    "state": "Karnataka",
                    "city": "Bangalore",
                    "pincode": "560001",
                    "latitude": "12.9716",
                    "longitude": "77.5946"
                }]
            })))
            .mount(server)
            .await;
    }

    fn agent(db: DatabaseConnection, server_uri: &str) -> DealPublishingAgent {
        let marketplace =
            MarketplaceClient::with_base_url(server_uri, Duration::from_secs(5)).unwrap();
        DealPublishingAgent::new(
            Arc::new(db),
            Arc::new(marketplace),
            AgentsConfig::default(),
        )
    }

    #[tokio::test]
    async fn accepted_suggestion_is_published_and_marked_posted() {
        let server = MockServer::start().await;
        mock_vendor_details(&server).await;

        Mock::given(method("POST"))
            .and(path("/create-deal/hackathon/"))
            .and(body_partial_json(serde_json::json!({
                "deal_price": "300.00",
                "actual_price": "600.00",
                "vendor_kyc": "vendor-1",
                "location_city": "Bangalore",
                "start_time": "09:00:00"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "message": "Deal created successfully",
                "data": {"deal_uuid": "deal-123"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let db = setup_db().await;
        let suggestion_id = seed_pipeline(&db, VendorFeedback::Accepted).await;

        let agent = agent(db.clone(), &server.uri());
        let report = agent.tick().await.unwrap();
        assert_eq!(report, PublishReport { posted: 1, failed: 0 });

        // Excluded from subsequent cycles
        let report = agent.tick().await.unwrap();
        assert_eq!(report, PublishReport { posted: 0, failed: 0 });

        let suggestion = crate::models::DealSuggestion::find_by_id(suggestion_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suggestion.status, SuggestionStatus::Posted);
    }

    #[tokio::test]
    async fn pending_suggestions_are_never_published() {
        let server = MockServer::start().await;
        let db = setup_db().await;
        seed_pipeline(&db, VendorFeedback::Pending).await;

        let report = agent(db, &server.uri()).tick().await.unwrap();
        assert_eq!(report, PublishReport { posted: 0, failed: 0 });
        // No marketplace calls were made at all (no mounted mocks to hit)
    }

    #[tokio::test]
    async fn failed_publish_leaves_status_unchanged() {
        let server = MockServer::start().await;
        mock_vendor_details(&server).await;

        Mock::given(method("POST"))
            .and(path("/create-deal/hackathon/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let db = setup_db().await;
        let suggestion_id = seed_pipeline(&db, VendorFeedback::Accepted).await;

        let report = agent(db.clone(), &server.uri()).tick().await.unwrap();
        assert_eq!(report, PublishReport { posted: 0, failed: 1 });

        let suggestion = crate::models::DealSuggestion::find_by_id(suggestion_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suggestion.status, SuggestionStatus::Generated);
    }

    #[test]
    fn normalize_time_trims_fractional_seconds() {
        assert_eq!(normalize_time(Some("13:37:05.746043")), "13:37:05");
        assert_eq!(normalize_time(Some("09:00:00")), "09:00:00");
        assert_eq!(normalize_time(Some("")), "00:00:00");
        assert_eq!(normalize_time(None), "00:00:00");
    }
}
