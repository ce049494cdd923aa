//! # Dealflow Library
//!
//! Polling agents that bridge a deals marketplace API with a relational
//! store and a generative-AI suggestion service: proximity events in, deal
//! suggestions out, accepted suggestions republished as live deals.

pub mod agents;
pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod marketplace;
pub mod models;
pub mod repositories;
pub mod server;
pub mod suggestion;
pub mod telemetry;
pub use migration;
