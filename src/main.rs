//! # Dealflow Main Entry Point
//!
//! Loads configuration, initializes telemetry and the database pool, runs
//! pending migrations, spawns the background agents, and serves the API
//! until a shutdown signal arrives.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dealflow::agents::{DealPublishingAgent, EventProcessingAgent, EventSourcingAgent};
use dealflow::ai::GeminiClient;
use dealflow::config::ConfigLoader;
use dealflow::marketplace::MarketplaceClient;
use dealflow::migration::{Migrator, MigratorTrait};
use dealflow::server::{AppState, run_server};
use dealflow::suggestion::SuggestionGenerator;
use dealflow::{db, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    config.validate()?;

    telemetry::init_tracing(&config.log_level, &config.log_format)?;
    info!(profile = %config.profile, "Starting dealflow");
    if let Ok(redacted_json) = config.redacted_json() {
        debug!(config = %redacted_json, "Loaded configuration");
    }

    let db = db::init_pool(&config).await?;
    Migrator::up(&db, None).await?;
    let db = Arc::new(db);

    let marketplace = Arc::new(MarketplaceClient::new(&config)?);
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let sourcing =
        EventSourcingAgent::new(db.clone(), marketplace.clone(), config.agents.clone());
    tokio::spawn(sourcing.run(shutdown.child_token()));

    // The event processor depends on the AI provider: without a key it is
    // not started at all, rather than crash-looping every cycle.
    let generator = if config.ai_configured() {
        let ai = GeminiClient::new(&config)?;
        Some(Arc::new(SuggestionGenerator::new(ai)))
    } else {
        warn!(
            "Gemini API key not configured; deal suggestion generation is unavailable \
             and the event processing agent will not run"
        );
        None
    };

    if let Some(generator) = &generator {
        let processor =
            EventProcessingAgent::new(db.clone(), generator.clone(), config.agents.clone());
        tokio::spawn(processor.run(shutdown.child_token()));
    }

    let publisher =
        DealPublishingAgent::new(db.clone(), marketplace.clone(), config.agents.clone());
    tokio::spawn(publisher.run(shutdown.child_token()));

    let state = AppState {
        db: db.as_ref().clone(),
        generator,
    };

    let result = run_server(config, state, shutdown.clone()).await;
    shutdown.cancel();
    result
}
