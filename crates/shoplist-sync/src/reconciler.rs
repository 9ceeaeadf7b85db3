//! Local list state with access control
//!
//! The [`ListReconciler`] is the single gateway to the persisted lists,
//! items and shares of a user. It applies the visibility rule on every
//! list read (a list is only returned to users holding a share on it),
//! reconciles share sets wholesale, and gates guarded mutations on the
//! caller's capability before anything is written.
//!
//! ## Lifecycle
//!
//! A reconciler is built over an already opened store and lives until
//! [`ListReconciler::close`]. After closing, every operation fails with
//! [`ReconcileError::Closed`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shoplist_core::domain::{
    Email, ItemId, ListId, Share, Shoppinglist, ShoppinglistItem, SyncEvent, SyncState, User,
};
use shoplist_core::ports::{IListStore, TickFilter};
use tracing::{debug, info};

use crate::permission::{self, Capability};
use crate::ReconcileError;

type Result<T> = std::result::Result<T, ReconcileError>;

/// Gateway to locally persisted shopping lists
pub struct ListReconciler {
    store: Arc<dyn IListStore>,
    open: AtomicBool,
}

impl ListReconciler {
    pub fn new(store: Arc<dyn IListStore>) -> Self {
        Self {
            store,
            open: AtomicBool::new(true),
        }
    }

    /// Stop serving requests. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("List reconciler closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn store(&self) -> Result<&dyn IListStore> {
        if self.is_open() {
            Ok(self.store.as_ref())
        } else {
            Err(ReconcileError::Closed)
        }
    }

    // ========================================================================
    // Housekeeping
    // ========================================================================

    /// Remove every row of every user
    pub async fn clear(&self) -> Result<u64> {
        Ok(self.store()?.clear().await?)
    }

    /// Remove every row belonging to `user`
    pub async fn clear_user(&self, user: &User) -> Result<u64> {
        Ok(self.store()?.clear_user(user.id).await?)
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Upsert a list and make its persisted shares equal to the model's
    pub async fn insert_list(&self, list: &Shoppinglist, user: &User) -> Result<()> {
        self.store()?.upsert_list(list, user.id).await?;
        self.clean_shares(list, user).await?;
        Ok(())
    }

    /// Same as [`insert_list`](Self::insert_list); upserts are idempotent
    pub async fn edit_list(&self, list: &Shoppinglist, user: &User) -> Result<()> {
        self.insert_list(list, user).await
    }

    /// Load a list, or `None` if it is missing or `user` holds no share on it
    pub async fn get_list(&self, id: ListId, user: &User) -> Result<Option<Shoppinglist>> {
        let list = self.store()?.get_list(id, user.id).await?;
        Ok(list.filter(|l| l.is_visible_to(&user.email)))
    }

    /// Every list visible to `user`
    pub async fn get_lists(&self, user: &User, include_deleted: bool) -> Result<Vec<Shoppinglist>> {
        let lists = self.store()?.get_lists(user.id, include_deleted).await?;
        Ok(lists
            .into_iter()
            .filter(|l| l.is_visible_to(&user.email))
            .collect())
    }

    /// The list at the head of the user's ordering
    pub async fn get_first_list(&self, user: &User) -> Result<Option<Shoppinglist>> {
        Ok(self.store()?.get_list_by_previous(None, user.id).await?)
    }

    /// The list that follows `previous`
    pub async fn get_list_previous(
        &self,
        previous: ListId,
        user: &User,
    ) -> Result<Option<Shoppinglist>> {
        Ok(self
            .store()?
            .get_list_by_previous(Some(previous), user.id)
            .await?)
    }

    /// Physically remove a list with its items and shares
    pub async fn delete_list(&self, id: ListId, user: &User) -> Result<u64> {
        Ok(self.store()?.delete_list(id, user.id).await?)
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub async fn insert_item(&self, item: &ShoppinglistItem, user: &User) -> Result<()> {
        Ok(self.store()?.upsert_item(item, user.id).await?)
    }

    pub async fn insert_items(&self, items: &[ShoppinglistItem], user: &User) -> Result<u64> {
        Ok(self.store()?.upsert_items(items, user.id).await?)
    }

    pub async fn edit_item(&self, item: &ShoppinglistItem, user: &User) -> Result<()> {
        self.insert_item(item, user).await
    }

    pub async fn edit_items(&self, items: &[ShoppinglistItem], user: &User) -> Result<u64> {
        self.insert_items(items, user).await
    }

    pub async fn get_item(&self, id: ItemId, user: &User) -> Result<Option<ShoppinglistItem>> {
        Ok(self.store()?.get_item(id, user.id).await?)
    }

    pub async fn get_items(
        &self,
        list_id: ListId,
        user: &User,
        include_deleted: bool,
    ) -> Result<Vec<ShoppinglistItem>> {
        Ok(self
            .store()?
            .get_items(list_id, user.id, include_deleted)
            .await?)
    }

    /// The item at the head of the list's ordering
    pub async fn get_first_item(
        &self,
        list_id: ListId,
        user: &User,
    ) -> Result<Option<ShoppinglistItem>> {
        Ok(self
            .store()?
            .get_item_by_previous(list_id, None, user.id)
            .await?)
    }

    /// The item of `list_id` that follows `previous`
    pub async fn get_item_previous(
        &self,
        list_id: ListId,
        previous: ItemId,
        user: &User,
    ) -> Result<Option<ShoppinglistItem>> {
        Ok(self
            .store()?
            .get_item_by_previous(list_id, Some(previous), user.id)
            .await?)
    }

    pub async fn delete_item(&self, id: ItemId, user: &User) -> Result<u64> {
        Ok(self.store()?.delete_item(id, user.id).await?)
    }

    /// Physically remove the items of a list selected by tick state
    pub async fn delete_items(
        &self,
        list_id: ListId,
        filter: TickFilter,
        user: &User,
    ) -> Result<u64> {
        Ok(self
            .store()?
            .delete_items(list_id, filter, user.id)
            .await?)
    }

    // ========================================================================
    // Shares
    // ========================================================================

    pub async fn get_shares(
        &self,
        list_id: ListId,
        user: &User,
        include_deleted: bool,
    ) -> Result<Vec<Share>> {
        Ok(self
            .store()?
            .get_shares(list_id, user.id, include_deleted)
            .await?)
    }

    pub async fn insert_share(&self, share: &Share, user: &User) -> Result<()> {
        Ok(self.store()?.upsert_share(share, user.id).await?)
    }

    /// Replace a share: delete by (list, email), then insert
    pub async fn edit_share(&self, share: &Share, user: &User) -> Result<()> {
        let store = self.store()?;
        store
            .delete_share(share.list_id(), share.email(), user.id)
            .await?;
        store.upsert_share(share, user.id).await?;
        Ok(())
    }

    pub async fn delete_share(&self, share: &Share, user: &User) -> Result<u64> {
        Ok(self
            .store()?
            .delete_share(share.list_id(), share.email(), user.id)
            .await?)
    }

    pub async fn delete_shares(&self, list_id: ListId, user: &User) -> Result<u64> {
        Ok(self.store()?.delete_shares(list_id, user.id).await?)
    }

    /// Make the persisted shares of `list` equal to the model's share set.
    ///
    /// Local share tombstones survive until their removal is pushed: they
    /// replace a synced share for the same email and are kept when the model
    /// no longer carries that email. A pending share in the model revives it.
    /// Returns the number of shares written.
    pub async fn clean_shares(&self, list: &Shoppinglist, user: &User) -> Result<u64> {
        let store = self.store()?;
        let mut shares: BTreeMap<Email, Share> = list
            .shares()
            .iter()
            .map(|(email, share)| (email.clone(), share.clone()))
            .collect();

        let tombstones = store
            .get_shares(list.id(), user.id, true)
            .await?
            .into_iter()
            .filter(|share| share.state().is_deleted());
        for tombstone in tombstones {
            let revived = shares
                .get(tombstone.email())
                .is_some_and(|share| share.state() == SyncState::ToSync);
            if !revived {
                shares.insert(tombstone.email().clone(), tombstone);
            }
        }

        let shares: Vec<Share> = shares.into_values().collect();
        store.replace_shares(list.id(), &shares, user.id).await?;
        debug!(list_id = %list.id(), count = shares.len(), "Reconciled shares");
        Ok(shares.len() as u64)
    }

    // ========================================================================
    // Permission gate
    // ========================================================================

    /// Fail unless `user` may edit the list
    pub async fn allow_edit_or_throw(&self, list_id: ListId, user: &User) -> Result<()> {
        self.require(list_id, user, Capability::Edit).await.map(drop)
    }

    /// Fail unless `user` may edit the list that owns `item`
    pub async fn allow_edit_item_or_throw(&self, item: &ShoppinglistItem, user: &User) -> Result<()> {
        self.allow_edit_or_throw(item.list_id(), user).await
    }

    /// Fail unless `user` may edit every list owning one of `items`
    pub async fn allow_edit_items_or_throw(
        &self,
        items: &[ShoppinglistItem],
        user: &User,
    ) -> Result<()> {
        self.require_all(items.iter().map(ShoppinglistItem::list_id), user, Capability::Edit)
            .await
    }

    /// Fail unless `user` may edit every one of `lists`
    pub async fn allow_edit_lists_or_throw(&self, lists: &[Shoppinglist], user: &User) -> Result<()> {
        self.require_all(lists.iter().map(Shoppinglist::id), user, Capability::Edit)
            .await
    }

    /// Fail unless `user` owns the list
    pub async fn allow_delete_or_throw(&self, list_id: ListId, user: &User) -> Result<()> {
        self.require(list_id, user, Capability::Delete).await.map(drop)
    }

    /// Look up the stored list and check `capability` against it
    async fn require(
        &self,
        list_id: ListId,
        user: &User,
        capability: Capability,
    ) -> Result<Shoppinglist> {
        let list = self.get_list(list_id, user).await?;
        permission::check(list.as_ref(), list_id, user, capability)?;
        list.ok_or(ReconcileError::PermissionDenied {
            list_id,
            email: user.email.clone(),
            capability,
        })
    }

    /// One lookup per distinct list id
    async fn require_all(
        &self,
        list_ids: impl IntoIterator<Item = ListId>,
        user: &User,
        capability: Capability,
    ) -> Result<()> {
        let unique: BTreeSet<ListId> = list_ids.into_iter().collect();
        for list_id in unique {
            self.require(list_id, user, capability).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Guarded mutations
    // ========================================================================

    /// Persist edited items after checking edit access to each owning list.
    ///
    /// Returns the items with their new sync state.
    pub async fn update_items(
        &self,
        items: Vec<ShoppinglistItem>,
        user: &User,
    ) -> Result<Vec<ShoppinglistItem>> {
        self.allow_edit_items_or_throw(&items, user).await?;
        let items: Vec<ShoppinglistItem> = items
            .into_iter()
            .map(|mut item| {
                item.mark(SyncEvent::LocalEdit);
                item
            })
            .collect();
        self.insert_items(&items, user).await?;
        Ok(items)
    }

    /// Persist an edited list after checking edit access to the stored list
    pub async fn update_list(&self, mut list: Shoppinglist, user: &User) -> Result<Shoppinglist> {
        self.allow_edit_or_throw(list.id(), user).await?;
        list.mark(SyncEvent::LocalEdit);
        self.edit_list(&list, user).await?;
        Ok(list)
    }

    /// Tombstone a list and its items; only the owner may do this.
    ///
    /// Returns the number of entities tombstoned.
    pub async fn remove_list(&self, list_id: ListId, user: &User) -> Result<u64> {
        let mut list = self.require(list_id, user, Capability::Delete).await?;
        let store = self.store()?;

        let mut items = store.get_items(list_id, user.id, false).await?;
        for item in &mut items {
            item.mark(SyncEvent::LocalDelete);
            item.touch();
        }
        store.upsert_items(&items, user.id).await?;

        list.mark(SyncEvent::LocalDelete);
        list.touch();
        store.upsert_list(&list, user.id).await?;

        info!(%list_id, items = items.len(), "Removed list");
        Ok(items.len() as u64 + 1)
    }

    /// Tombstone the items of a list selected by tick state
    pub async fn remove_items(&self, list_id: ListId, filter: TickFilter, user: &User) -> Result<u64> {
        self.allow_edit_or_throw(list_id, user).await?;
        let store = self.store()?;

        let mut items: Vec<ShoppinglistItem> = store
            .get_items(list_id, user.id, false)
            .await?
            .into_iter()
            .filter(|item| filter.matches(item.tick()))
            .collect();
        for item in &mut items {
            item.mark(SyncEvent::LocalDelete);
            item.touch();
        }
        let count = store.upsert_items(&items, user.id).await?;

        debug!(%list_id, %filter, count, "Removed items");
        Ok(count)
    }
}

impl std::fmt::Debug for ListReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListReconciler")
            .field("open", &self.is_open())
            .finish()
    }
}
