//! Chain adapter seams.
//!
//! - `source`: capability traits (`BlockSource`, `TokenSource`)
//! - `http`: adapter bridge speaking canonical JSON over HTTP
//! - `registry`: chains and their capability sets

mod error;
mod http;
mod registry;
mod source;

pub use error::ChainSourceError;
pub use http::HttpChainSource;
pub use registry::{ChainDescriptor, ChainRegistry};
pub use source::{BlockSource, TokenSource, XpubSource};
