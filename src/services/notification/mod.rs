//! Outbound notification delivery.

mod error;
mod webhook;

pub use error::NotificationError;
pub use webhook::WebhookSender;
