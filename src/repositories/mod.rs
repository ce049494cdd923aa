//! # Repository Layer
//!
//! This module contains repository implementations that encapsulate SeaORM
//! operations for the pipeline entities, providing a clean API for data
//! access on top of an explicitly injected connection.

pub mod deal_suggestion;
pub mod event;
pub mod inventory;

pub use deal_suggestion::DealSuggestionRepository;
pub use event::{EventRepository, RecordOutcome};
pub use inventory::InventoryRepository;
