//! shoplist-net - Request dispatch for the shoplist SDK
//!
//! Prioritized request queue with a TTL response cache, cancellation and
//! single-consumer callback delivery, over a pluggable HTTP transport.
//!
//! ## Modules
//!
//! - [`cache`] - TTL cache keyed by entity resource name
//! - [`query`] - Canonical query strings
//! - [`request`] - Request description and lifecycle
//! - [`response`] - Outcome and fault types
//! - [`kinds`] - Parse capabilities (string, JSON object, JSON array)
//! - [`delivery`] - Callback delivery channel
//! - [`dispatcher`] - Priority queue and worker pool
//! - [`transport`] - `reqwest` transport adapter

pub mod cache;
pub mod delivery;
pub mod dispatcher;
pub mod kinds;
pub mod query;
pub mod request;
pub mod response;
pub mod transport;

use thiserror::Error;

pub use cache::{Cache, CacheItem, DEFAULT_TTL};
pub use delivery::{Delivery, DeliveryContext};
pub use dispatcher::{QueueOptions, QueueStats, RequestQueue};
pub use kinds::{JsonArrayRequest, JsonObjectRequest, RequestKind, StringRequest};
pub use request::{Priority, Request, RequestHandle, RequestSpec, RequestState};
pub use response::{Fault, Response};
pub use transport::HttpTransport;

/// Errors raised while setting up the network layer
#[derive(Debug, Error)]
pub enum NetError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
