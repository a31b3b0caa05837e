//! Durable mapping from (chain, address) to subscribers.

mod error;
mod index;

pub use error::SubscriptionError;
pub use index::SubscriptionIndex;
