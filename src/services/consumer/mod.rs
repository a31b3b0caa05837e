//! Queue consumers.
//!
//! Every consumer is a [`MessageHandler`] driven by a [`ConsumerRunner`]:
//! - [`Notifier`] delivers notification events to subscriber webhooks
//! - [`TokenIndexer`] extends asset associations from transaction batches
//! - [`TokenSearcherConsumer`] records assets fetched by the [`TokenSearcher`]
//! - [`Subscriber`] applies subscription events to the index

mod error;
mod notifier;
mod runner;
mod subscriber;
mod token_indexer;
mod token_searcher;

pub use error::ConsumerError;
pub use notifier::{Notifier, SUBSCRIBER_HEADER};
pub use runner::{process_delivery, ConsumeOutcome, ConsumerRunner, MessageHandler};
pub use subscriber::Subscriber;
pub use token_indexer::{associations_from_txs, TokenIndexer};
pub use token_searcher::{TokenSearcher, TokenSearcherConsumer};
