//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the core depends on; their implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`INetworkTransport`] - one HTTP exchange (implemented in `shoplist-net`)
//! - [`IListStore`] - persistent lists, items and shares (implemented in `shoplist-store`)

pub mod list_store;
pub mod network_transport;

pub use list_store::{IListStore, TickFilter};
pub use network_transport::{
    HttpMethod, INetworkTransport, TransportError, TransportRequest, TransportResponse,
};
