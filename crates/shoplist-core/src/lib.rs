//! Shoplist Core - Domain model and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Shoppinglist`, `ShoppinglistItem`, `Share`, `User`
//! - **Sync state machine** - `SyncState`, `SyncEvent` and the pure `next_state` function
//! - **Port definitions** - Traits for adapters: `INetworkTransport`, `IListStore`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data and rules with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`shoplist-net` for HTTP, `shoplist-store` for SQLite).

pub mod config;
pub mod domain;
pub mod ports;
