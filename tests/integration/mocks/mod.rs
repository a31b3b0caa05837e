//! Mock implementations and fixtures shared by the integration tests.

mod models;
mod services;

pub use models::*;
pub use services::*;
