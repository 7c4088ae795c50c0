//! # trellis-odata
//!
//! Request translation for the downstream data service: entity key
//! encoding, query option construction, and the HTTP client that issues
//! the translated requests.
//!
//! Tool handlers in `trellis-mcp` talk to this crate exclusively through
//! the [`DataService`] trait, so tests can substitute an in-memory
//! implementation.

pub mod client;
pub mod error;
pub mod key;
pub mod query;
pub mod service;

pub use client::ODataClient;
pub use error::ServiceError;
pub use key::encode_key;
pub use query::QueryOptions;
pub use service::{DataService, ResourcePath};
