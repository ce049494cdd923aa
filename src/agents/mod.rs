//! # Background Agents
//!
//! The three polling agents driving the pipeline: event sourcing
//! (marketplace -> events), event processing (events -> deal suggestions),
//! and deal publishing (accepted suggestions -> marketplace deals).
//!
//! Each agent is a single timer-driven task owning its dependencies,
//! running one tick at a time until its shutdown token fires. Records
//! within a tick are processed sequentially and independently: one bad
//! record never aborts the batch.

use std::time::Duration;

use rand::Rng;

pub mod deal_publishing;
pub mod event_processing;
pub mod event_sourcing;

pub use deal_publishing::DealPublishingAgent;
pub use event_processing::EventProcessingAgent;
pub use event_sourcing::EventSourcingAgent;

/// Apply up to `jitter_pct_max` of random extra delay to a tick interval.
pub(crate) fn jittered(interval: Duration, jitter_pct_max: f64) -> Duration {
    if jitter_pct_max <= 0.0 {
        return interval;
    }

    let jitter_pct = rand::thread_rng().gen_range(0.0..=jitter_pct_max);
    interval + interval.mul_f64(jitter_pct)
}
