//! Domain entities and business rules
//!
//! This module contains the core domain types for shoplist:
//! - Newtypes for identifiers, e-mail addresses and resource names
//! - The sync state machine shared by every syncable entity
//! - Shopping lists, their items and their shares
//! - Domain-specific error types

pub mod errors;
pub mod item;
pub mod newtypes;
pub mod share;
pub mod shoppinglist;
pub mod sync_state;
pub mod user;

// Re-export commonly used types
pub use errors::DomainError;
pub use item::ShoppinglistItem;
pub use newtypes::*;
pub use share::{Share, ShareAccess};
pub use shoppinglist::{ListType, Shoppinglist};
pub use sync_state::{next_state, SyncEvent, SyncState};
pub use user::User;
