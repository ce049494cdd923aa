//! # Event Processing Agent
//!
//! Polls the events table for unprocessed rows, assembles the vendor's
//! current inventory as context, drives each event through suggestion
//! generation, and marks it processed only after the suggestion has been
//! persisted. Events whose processing fails stay unprocessed and are
//! retried on every subsequent cycle.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::agents::jittered;
use crate::config::AgentsConfig;
use crate::error::RepositoryError;
use crate::models::event;
use crate::repositories::{DealSuggestionRepository, EventRepository, InventoryRepository};
use crate::suggestion::{EventContext, InventoryContext, SuggestionGenerator};

type ProcessError = Box<dyn std::error::Error + Send + Sync>;

/// Background agent turning stored events into deal suggestions.
pub struct EventProcessingAgent {
    db: Arc<DatabaseConnection>,
    generator: Arc<SuggestionGenerator>,
    config: AgentsConfig,
}

/// Counters for one processing cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: u64,
    pub failed: u64,
}

impl EventProcessingAgent {
    /// Create a new agent instance.
    pub fn new(
        db: Arc<DatabaseConnection>,
        generator: Arc<SuggestionGenerator>,
        config: AgentsConfig,
    ) -> Self {
        Self {
            db,
            generator,
            config,
        }
    }

    /// Run the agent loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting event processing agent");
        let interval = Duration::from_secs(self.config.processing_interval_seconds);

        loop {
            let tick_started = Instant::now();
            match self.tick().await {
                Ok(report) => {
                    debug!(
                        processed = report.processed,
                        failed = report.failed,
                        "Event processing cycle completed"
                    );
                    counter!("event_processing_processed_total").increment(report.processed);
                    counter!("event_processing_failed_total").increment(report.failed);
                }
                Err(err) => {
                    error!(error = ?err, "Event processing cycle failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(Duration::from_secs(self.config.error_backoff_seconds)) => {}
                    }
                }
            }
            histogram!("event_processing_cycle_duration_ms")
                .record(tick_started.elapsed().as_secs_f64() * 1_000.0);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(jittered(interval, self.config.jitter_pct_max)) => {}
            }
        }

        info!("Event processing agent stopped");
    }

    /// One polling cycle over all unprocessed events. Failure of one event
    /// never aborts the batch.
    pub async fn tick(&self) -> Result<CycleReport, RepositoryError> {
        let mut report = CycleReport::default();

        let events = EventRepository::new(&self.db).find_unprocessed().await?;
        if events.is_empty() {
            debug!("No unprocessed events found");
            return Ok(report);
        }

        info!(event_count = events.len(), "Processing unprocessed events");

        for event in &events {
            match self.process_event(event).await {
                Ok(suggestion_id) => {
                    report.processed += 1;
                    info!(
                        event_id = event.id,
                        suggestion_id,
                        "Event processed into deal suggestion"
                    );
                }
                Err(err) => {
                    // Left unprocessed for retry on the next cycle
                    report.failed += 1;
                    error!(
                        event_id = event.id,
                        vendor_id = %event.vendor_id,
                        error = %err,
                        "Failed to process event"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn process_event(&self, event: &event::Model) -> Result<i32, ProcessError> {
        let inventory = InventoryRepository::new(&self.db)
            .list_for_vendor(&event.vendor_id)
            .await?;

        let inventory_context: Vec<InventoryContext> =
            inventory.iter().map(InventoryContext::from).collect();
        let event_context = EventContext::from(event);

        let suggestion = self
            .generator
            .generate(&event_context, &inventory_context)
            .await?;

        // Persist first, then flip the processed flag, so a crash between
        // the two retries the event rather than losing the suggestion.
        let stored = DealSuggestionRepository::new(&self.db)
            .insert_generated(&event.vendor_id, event.id, &suggestion)
            .await?;

        EventRepository::new(&self.db)
            .mark_processed(event.id)
            .await?;

        Ok(stored.id)
    }
}
