//! List store port (driven/secondary port)
//!
//! This module defines the interface for persisting shopping lists, their
//! items and their shares on the device.
//!
//! ## Design Notes
//!
//! - Every row is addressed by (entity id, owning user id); two users
//!   signed in on the same device never see each other's rows.
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - Permission checks are not the store's concern; the reconciler gates
//!   writes before calling into the store.
//! - Ordered retrieval follows the predecessor link: `previous == None`
//!   selects the first entity.

use std::fmt;

use crate::domain::{Email, ItemId, ListId, Share, Shoppinglist, ShoppinglistItem, UserId};

/// Which items a bulk item delete applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TickFilter {
    /// Only ticked items
    Ticked,
    /// Only unticked items
    Unticked,
    /// Every item of the list
    #[default]
    All,
}

impl TickFilter {
    /// Map an optional tick state: `Some(true)` ticked, `Some(false)` unticked, `None` all
    pub fn from_tick(tick: Option<bool>) -> Self {
        match tick {
            Some(true) => TickFilter::Ticked,
            Some(false) => TickFilter::Unticked,
            None => TickFilter::All,
        }
    }

    /// Returns true if an item with the given tick state is selected
    pub fn matches(&self, tick: bool) -> bool {
        match self {
            TickFilter::Ticked => tick,
            TickFilter::Unticked => !tick,
            TickFilter::All => true,
        }
    }
}

impl fmt::Display for TickFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickFilter::Ticked => write!(f, "ticked"),
            TickFilter::Unticked => write!(f, "unticked"),
            TickFilter::All => write!(f, "all"),
        }
    }
}

/// Port trait for local list persistence
///
/// ## Implementation Notes
///
/// - `upsert_*` are idempotent: writing the same entity twice leaves one row.
/// - Lists returned by `get_list`, `get_lists` and `get_list_by_previous`
///   carry their non-deleted shares.
/// - `replace_shares` must be atomic: readers never observe a list with
///   only part of its new share set.
#[async_trait::async_trait]
pub trait IListStore: Send + Sync {
    // --- List operations ---

    /// Insert or replace a list row (shares are written separately)
    async fn upsert_list(&self, list: &Shoppinglist, user: UserId) -> anyhow::Result<()>;

    /// Load one list with its live shares
    async fn get_list(&self, id: ListId, user: UserId) -> anyhow::Result<Option<Shoppinglist>>;

    /// Load every list of the user; `include_deleted` also returns list and
    /// share tombstones
    async fn get_lists(
        &self,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<Shoppinglist>>;

    /// Load the list whose predecessor link equals `previous`
    async fn get_list_by_previous(
        &self,
        previous: Option<ListId>,
        user: UserId,
    ) -> anyhow::Result<Option<Shoppinglist>>;

    /// Delete a list row and everything that belongs to it; returns rows removed
    async fn delete_list(&self, id: ListId, user: UserId) -> anyhow::Result<u64>;

    // --- Item operations ---

    /// Insert or replace one item
    async fn upsert_item(&self, item: &ShoppinglistItem, user: UserId) -> anyhow::Result<()>;

    /// Insert or replace many items in one transaction; returns rows written
    async fn upsert_items(&self, items: &[ShoppinglistItem], user: UserId)
        -> anyhow::Result<u64>;

    async fn get_item(&self, id: ItemId, user: UserId) -> anyhow::Result<Option<ShoppinglistItem>>;

    /// Items of one list, optionally including tombstones
    async fn get_items(
        &self,
        list_id: ListId,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<ShoppinglistItem>>;

    /// The item of `list_id` whose predecessor link equals `previous`
    async fn get_item_by_previous(
        &self,
        list_id: ListId,
        previous: Option<ItemId>,
        user: UserId,
    ) -> anyhow::Result<Option<ShoppinglistItem>>;

    async fn delete_item(&self, id: ItemId, user: UserId) -> anyhow::Result<u64>;

    /// Delete the items of a list selected by `filter`; returns rows removed
    async fn delete_items(
        &self,
        list_id: ListId,
        filter: TickFilter,
        user: UserId,
    ) -> anyhow::Result<u64>;

    // --- Share operations ---

    async fn get_shares(
        &self,
        list_id: ListId,
        user: UserId,
        include_deleted: bool,
    ) -> anyhow::Result<Vec<Share>>;

    /// Insert or replace one share, keyed by (list, email)
    async fn upsert_share(&self, share: &Share, user: UserId) -> anyhow::Result<()>;

    async fn delete_share(
        &self,
        list_id: ListId,
        email: &Email,
        user: UserId,
    ) -> anyhow::Result<u64>;

    /// Delete every share of a list
    async fn delete_shares(&self, list_id: ListId, user: UserId) -> anyhow::Result<u64>;

    /// Atomically replace the share set of a list
    async fn replace_shares(
        &self,
        list_id: ListId,
        shares: &[Share],
        user: UserId,
    ) -> anyhow::Result<()>;

    // --- Housekeeping ---

    /// Remove every row of every user; returns rows removed
    async fn clear(&self) -> anyhow::Result<u64>;

    /// Remove every row of one user; returns rows removed
    async fn clear_user(&self, user: UserId) -> anyhow::Result<u64>;
}
