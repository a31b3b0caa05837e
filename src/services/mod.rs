//! Core services of the observation pipeline.
//!
//! - `chain`: Chain adapters and the capability registry
//! - `observer`: Per-chain polling, planning and block tracking
//! - `subscription`: Address to subscriber index
//! - `dispatcher`: Fan-out of matched transactions onto the queue
//! - `queue`: Durable queue abstraction and broker supervision
//! - `consumer`: Queue consumers (notifier, token indexer, token searcher, subscriber)
//! - `notification`: Webhook delivery
//! - `assets`: Address to asset associations
//! - `storage`: Key-value persistence

pub mod assets;
pub mod chain;
pub mod consumer;
pub mod dispatcher;
pub mod notification;
pub mod observer;
pub mod queue;
pub mod storage;
pub mod subscription;
