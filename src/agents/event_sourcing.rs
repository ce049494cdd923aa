//! # Event Sourcing Agent
//!
//! Polls the marketplace for vendors and activities, matches each vendor's
//! primary address to the nearest activity by great-circle distance, and
//! records the match as an event, deduplicated by activity id.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::agents::jittered;
use crate::config::AgentsConfig;
use crate::geo;
use crate::marketplace::{Activity, MarketplaceClient, MarketplaceError, VendorSummary};
use crate::repositories::event::{EventRepository, RecordOutcome};

type VendorError = Box<dyn std::error::Error + Send + Sync>;

/// Background agent turning vendor-activity proximity into stored events.
pub struct EventSourcingAgent {
    db: Arc<DatabaseConnection>,
    marketplace: Arc<MarketplaceClient>,
    config: AgentsConfig,
}

/// Counters for one sourcing tick.
#[derive(Debug, Default)]
pub struct SourcingStats {
    pub vendors_polled: u64,
    pub events_created: u64,
    pub events_skipped: u64,
    pub vendors_failed: u64,
}

impl EventSourcingAgent {
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
        info!("Starting event sourcing agent");
        let interval = Duration::from_secs(self.config.sourcing_interval_seconds);

        loop {
            let tick_started = Instant::now();
            match self.tick().await {
                Ok(stats) => {
                    debug!(
                        vendors = stats.vendors_polled,
                        created = stats.events_created,
                        skipped = stats.events_skipped,
                        failed = stats.vendors_failed,
                        "Event sourcing tick completed"
                    );
                    counter!("event_sourcing_events_created_total")
                        .increment(stats.events_created);
                    counter!("event_sourcing_vendor_failures_total")
                        .increment(stats.vendors_failed);
                }
                Err(err) => {
                    error!(error = ?err, "Event sourcing tick failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(Duration::from_secs(self.config.error_backoff_seconds)) => {}
                    }
                }
            }
            histogram!("event_sourcing_tick_duration_ms")
                .record(tick_started.elapsed().as_secs_f64() * 1_000.0);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(jittered(interval, self.config.jitter_pct_max)) => {}
            }
        }

        info!("Event sourcing agent stopped");
    }

    /// One polling cycle: list vendors and activities, match, record.
    pub async fn tick(&self) -> Result<SourcingStats, MarketplaceError> {
        let mut stats = SourcingStats::default();

        let vendors = self.marketplace.list_vendors().await?;
        if vendors.is_empty() {
            warn!("No vendors returned by marketplace");
            return Ok(stats);
        }

        // One activity listing per tick, shared across vendors.
        let activities = self.marketplace.list_activities().await?;
        if activities.is_empty() {
            warn!("No activities returned by marketplace");
            return Ok(stats);
        }

        for vendor in &vendors {
            stats.vendors_polled += 1;
            match self.process_vendor(vendor, &activities).await {
                Ok(RecordOutcome::Created(event)) => {
                    stats.events_created += 1;
                    info!(
                        vendor_id = %vendor.vendor_id,
                        event_id = event.id,
                        activity_id = %event.activity_id,
                        "Recorded proximity event"
                    );
                }
                Ok(RecordOutcome::Skipped) => {
                    stats.events_skipped += 1;
                }
                Err(err) => {
                    stats.vendors_failed += 1;
                    error!(
                        vendor_id = %vendor.vendor_id,
                        error = %err,
                        "Failed to process vendor"
                    );
                }
            }
        }

        Ok(stats)
    }

    async fn process_vendor(
        &self,
        vendor: &VendorSummary,
        activities: &[Activity],
    ) -> Result<RecordOutcome, VendorError> {
        let details = self.marketplace.vendor_details(&vendor.vendor_id).await?;

        let address = details
            .addresses
            .first()
            .ok_or_else(|| format!("vendor {} has no addresses", vendor.vendor_id))?;

        let (vendor_lat, vendor_lon) = address.coordinates().ok_or_else(|| {
            format!(
                "vendor {} address has non-numeric coordinates",
                vendor.vendor_id
            )
        })?;

        // An activity exactly at the vendor's location wins outright;
        // otherwise fall back to nearest-by-distance.
        let exact = activities.iter().find(|activity| {
            activity.coordinates().is_some_and(|(lat, lon)| {
                geo::coordinates_match(vendor_lat, vendor_lon, lat, lon)
            })
        });

        let matched = match exact {
            Some(activity) => activity,
            None => geo::nearest(vendor_lat, vendor_lon, activities, Activity::coordinates)
                .ok_or("no activities with parsable coordinates")?,
        };

        let outcome = EventRepository::new(&self.db)
            .record_event(&vendor.vendor_id, matched)
            .await?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("create in-memory db");
        Migrator::up(&db, None).await.expect("apply migrations");
        db
    }

    fn agent(db: DatabaseConnection, server_uri: &str) -> EventSourcingAgent {
        let marketplace =
            MarketplaceClient::with_base_url(server_uri, Duration::from_secs(5)).unwrap();
        EventSourcingAgent::new(
            Arc::new(db),
            Arc::new(marketplace),
            AgentsConfig::default(),
        )
    }

    async fn mock_marketplace(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/vendor/lists/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vendors": [{"vendor_id": "vendor-1"}]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/vendor/details/vendor-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vendor_id": "vendor-1",
                "addresses": [{
                    "country": "India",
                    "state": "UP",
                    "city": "Vrindavan",
                    "pincode": "281121",
                    "latitude": "27.5727",
                    "longitude": "77.6506"
                }]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/activities/lists/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "activity_id": "near",
                    "activity_title": "Nearby Fair",
                    "latitude": "27.5747",
                    "longitude": "77.6525",
                    "location": "Vrindavan"
                },
                {
                    "activity_id": "far",
                    "activity_title": "Distant Expo",
                    "latitude": "40.0",
                    "longitude": "-70.0",
                    "location": "Elsewhere"
                }
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn tick_records_nearest_activity_once() {
        let server = MockServer::start().await;
        mock_marketplace(&server).await;

        let db = setup_db().await;
        let agent = agent(db.clone(), &server.uri());

        let stats = agent.tick().await.unwrap();
        assert_eq!(stats.vendors_polled, 1);
        assert_eq!(stats.events_created, 1);

        let events = EventRepository::new(&db).find_unprocessed().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activity_id, "near");

        // Second tick dedups on activity_id
        let stats = agent.tick().await.unwrap();
        assert_eq!(stats.events_created, 0);
        assert_eq!(stats.events_skipped, 1);
    }

    #[tokio::test]
    async fn vendor_without_addresses_is_counted_failed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/vendor/lists/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vendors": [{"vendor_id": "vendor-1"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/vendor/details/vendor-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vendor_id": "vendor-1",
                "addresses": []
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/activities/lists/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"activity_id": "a", "activity_title": "t", "latitude": "1.0", "longitude": "2.0"}
            ])))
            .mount(&server)
            .await;

        let db = setup_db().await;
        let agent = agent(db, &server.uri());

        let stats = agent.tick().await.unwrap();
        assert_eq!(stats.vendors_failed, 1);
        assert_eq!(stats.events_created, 0);
    }

    #[tokio::test]
    async fn marketplace_outage_fails_the_tick() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vendor/lists/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let db = setup_db().await;
        let agent = agent(db, &server.uri());

        assert!(matches!(
            agent.tick().await,
            Err(MarketplaceError::Http { status: 502, .. })
        ));
    }
}
