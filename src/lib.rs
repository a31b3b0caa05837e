//! Multi-chain block observation and event dispatch.
//!
//! Pollers follow each configured chain, turn new blocks into transaction
//! batches and match them against address subscriptions. Matches travel over a
//! durable queue to consumers that deliver webhooks, keep address to asset
//! associations current and apply subscription changes.

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
