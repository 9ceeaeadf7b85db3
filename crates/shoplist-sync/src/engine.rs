//! Push/pull synchronization with the remote list API
//!
//! The [`SyncEngine`] converges the local store with the server through the
//! request queue.
//!
//! ## Sync Flow
//!
//! 1. **Push**: list, share and item tombstones are sent as DELETE and
//!    purged on success; lists and items in `ToSync` or `Error` are marked
//!    `Syncing` and sent as PUT. Deleting the user's own share leaves the
//!    list, which is then dropped locally.
//! 2. **Pull**: the remote list set is fetched; each remote list (and its
//!    items) replaces the local copy unless the local copy is a tombstone,
//!    or is pending and at least as recent; local `Synced` lists the server
//!    no longer has are removed
//!
//! Remote requests complete through the queue's delivery context, which
//! the caller must keep driving while a sync runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use shoplist_core::domain::{
    ListId, Share, Shoppinglist, ShoppinglistItem, SyncEvent, SyncState, User,
};
use shoplist_core::ports::HttpMethod;
use shoplist_net::{JsonArrayRequest, Priority, Request, RequestKind, RequestQueue, StringRequest};
use tracing::{debug, info, warn};

use crate::reconciler::ListReconciler;
use crate::wire::{WireItem, WireList};
use crate::SyncEngineError;

/// Tag carried by every request the engine issues
pub const SYNC_TAG: &str = "shoplist-sync";

// ============================================================================
// SyncResult
// ============================================================================

/// Summary of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Lists and items accepted by the server
    pub pushed: u32,
    /// Tombstones confirmed by the server and purged locally
    pub deleted: u32,
    /// Remote lists and items written locally
    pub pulled: u32,
    /// Local entities removed because the server no longer has them
    pub removed: u32,
    /// Per-entity failures that did not abort the run
    pub errors: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.pushed += other.pushed;
        self.deleted += other.deleted;
        self.pulled += other.pulled;
        self.removed += other.removed;
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// Remote paths
// ============================================================================

fn lists_path(user: &User) -> String {
    format!("/v2/users/{}/shoppinglists", user.id)
}

fn list_path(user: &User, list_id: ListId) -> String {
    format!("{}/{}", lists_path(user), list_id)
}

fn items_path(user: &User, list_id: ListId) -> String {
    format!("{}/items", list_path(user, list_id))
}

fn share_path(user: &User, share: &Share) -> String {
    format!("{}/shares/{}", list_path(user, share.list_id()), share.email())
}

fn item_path(user: &User, item: &ShoppinglistItem) -> String {
    format!("{}/{}", items_path(user, item.list_id()), item.id())
}

/// Returns true if the user's own share on `list` is a tombstone
fn has_left(list: &Shoppinglist, user: &User) -> bool {
    list.share(&user.email).is_some_and(|share| share.state().is_deleted())
}

/// Apply `event` to a list and every share it carries
fn mark_with_shares(list: &mut Shoppinglist, event: SyncEvent) {
    list.mark(event);
    let shares: Vec<Share> = list
        .shares()
        .values()
        .cloned()
        .map(|mut share| {
            share.mark(event);
            share
        })
        .collect();
    list.set_shares(shares);
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Converges local lists with the remote service
pub struct SyncEngine {
    queue: Arc<RequestQueue>,
    reconciler: Arc<ListReconciler>,
}

impl SyncEngine {
    pub fn new(queue: Arc<RequestQueue>, reconciler: Arc<ListReconciler>) -> Self {
        Self { queue, reconciler }
    }

    pub fn reconciler(&self) -> &Arc<ListReconciler> {
        &self.reconciler
    }

    /// Push local changes, then pull the remote state
    #[tracing::instrument(skip(self, user), fields(user = %user.id))]
    pub async fn sync(&self, user: &User) -> Result<SyncResult, SyncEngineError> {
        let start = Instant::now();
        let mut result = self.push_pending(user).await?;
        result.merge(self.pull_lists(user).await?);
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pushed = result.pushed,
            deleted = result.deleted,
            pulled = result.pulled,
            removed = result.removed,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Sync cycle complete"
        );
        Ok(result)
    }

    /// Cancel every request the engine has in flight
    pub fn cancel(&self) -> usize {
        self.queue.cancel_all(SYNC_TAG)
    }

    async fn send<K: RequestKind>(&self, request: Request<K>) -> Result<K::Output, SyncEngineError> {
        let (_handle, rx) = self.queue.add_awaitable(request.tag(SYNC_TAG).ignore_cache(true));
        let response = rx.await.map_err(|_| SyncEngineError::Canceled)?;
        Ok(response.into_result()?)
    }

    // ========================================================================
    // Pull
    // ========================================================================

    /// Fetch the remote lists and apply them locally
    pub async fn pull_lists(&self, user: &User) -> Result<SyncResult, SyncEngineError> {
        let mut result = SyncResult::default();
        let values = self
            .send(Request::get(JsonArrayRequest, lists_path(user)).priority(Priority::High))
            .await?;

        let local: HashMap<ListId, Shoppinglist> = self
            .reconciler
            .get_lists(user, true)
            .await?
            .into_iter()
            .map(|l| (l.id(), l))
            .collect();

        let mut remote_ids = HashSet::new();
        for value in values {
            let remote = match serde_json::from_value::<WireList>(value)
                .map_err(SyncEngineError::from)
                .and_then(|wire| Shoppinglist::try_from(wire).map_err(SyncEngineError::from))
            {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed remote list");
                    result.errors.push(e.to_string());
                    continue;
                }
            };
            remote_ids.insert(remote.id());

            match local.get(&remote.id()) {
                Some(existing) if existing.state().is_deleted() || has_left(existing, user) => {
                    debug!(list_id = %remote.id(), "Keeping local tombstone");
                    continue;
                }
                Some(existing)
                    if existing.state().is_pending() && existing.modified() >= remote.modified() =>
                {
                    debug!(list_id = %remote.id(), state = %existing.state(), "Keeping newer local list");
                    continue;
                }
                Some(existing) if existing.same(&remote) => {}
                _ => {
                    self.reconciler.insert_list(&remote, user).await?;
                    result.pulled += 1;
                }
            }

            match self.pull_items(remote.id(), user).await {
                Ok(items) => result.merge(items),
                Err(e) => {
                    warn!(list_id = %remote.id(), error = %e, "Failed to pull items");
                    result.errors.push(format!("items of {}: {e}", remote.id()));
                }
            }
        }

        for (id, list) in &local {
            if list.state() == SyncState::Synced && !remote_ids.contains(id) {
                debug!(list_id = %id, "Removing list deleted remotely");
                self.reconciler.delete_list(*id, user).await?;
                result.removed += 1;
            }
        }

        Ok(result)
    }

    async fn pull_items(&self, list_id: ListId, user: &User) -> Result<SyncResult, SyncEngineError> {
        let mut result = SyncResult::default();
        let values = self
            .send(Request::get(JsonArrayRequest, items_path(user, list_id)))
            .await?;

        let local: HashMap<_, ShoppinglistItem> = self
            .reconciler
            .get_items(list_id, user, true)
            .await?
            .into_iter()
            .map(|i| (i.id(), i))
            .collect();

        let mut remote_ids = HashSet::new();
        let mut accepted = Vec::new();
        for value in values {
            let remote = match serde_json::from_value::<WireItem>(value)
                .map_err(SyncEngineError::from)
                .and_then(|wire| ShoppinglistItem::try_from(wire).map_err(SyncEngineError::from))
            {
                Ok(item) => item,
                Err(e) => {
                    warn!(%list_id, error = %e, "Skipping malformed remote item");
                    result.errors.push(e.to_string());
                    continue;
                }
            };
            remote_ids.insert(remote.id());

            match local.get(&remote.id()) {
                Some(existing) if existing.state().is_deleted() => {}
                Some(existing)
                    if existing.state().is_pending() && existing.modified() >= remote.modified() => {}
                Some(existing) if existing == &remote && existing.state() == SyncState::Synced => {}
                _ => accepted.push(remote),
            }
        }

        if !accepted.is_empty() {
            self.reconciler.insert_items(&accepted, user).await?;
            result.pulled += accepted.len() as u32;
        }

        for (id, item) in &local {
            if item.state() == SyncState::Synced && !remote_ids.contains(id) {
                self.reconciler.delete_item(*id, user).await?;
                result.removed += 1;
            }
        }

        Ok(result)
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Send every pending local change to the server
    pub async fn push_pending(&self, user: &User) -> Result<SyncResult, SyncEngineError> {
        let mut result = SyncResult::default();

        for mut list in self.reconciler.get_lists(user, true).await? {
            if list.state().is_deleted() {
                self.push_list_delete(&list, user, &mut result).await?;
                continue;
            }
            if !self.push_share_deletes(&mut list, user, &mut result).await? {
                continue;
            }
            if list.state().needs_push() && !self.push_list(list.clone(), user, &mut result).await? {
                // items of a list the server rejected would fail the same way
                continue;
            }
            self.push_items(list.id(), user, &mut result).await?;
        }

        Ok(result)
    }

    async fn push_list_delete(
        &self,
        list: &Shoppinglist,
        user: &User,
        result: &mut SyncResult,
    ) -> Result<(), SyncEngineError> {
        let request = Request::new(StringRequest, HttpMethod::Delete, list_path(user, list.id()));
        match self.send(request).await {
            Ok(_) => {
                self.reconciler.delete_list(list.id(), user).await?;
                result.deleted += 1;
            }
            Err(e) => {
                warn!(list_id = %list.id(), error = %e, "Remote list delete failed, keeping tombstone");
                result.errors.push(format!("delete list {}: {e}", list.id()));
            }
        }
        Ok(())
    }

    /// Send the share tombstones of a list, dropping each one the server
    /// confirms. Returns false once the list is no longer the user's to push.
    async fn push_share_deletes(
        &self,
        list: &mut Shoppinglist,
        user: &User,
        result: &mut SyncResult,
    ) -> Result<bool, SyncEngineError> {
        let tombstones: Vec<Share> = list
            .shares()
            .values()
            .filter(|share| share.state().is_deleted())
            .cloned()
            .collect();

        for share in tombstones {
            let own = share.email() == &user.email;
            let request = Request::new(StringRequest, HttpMethod::Delete, share_path(user, &share));
            match self.send(request).await {
                Ok(_) if own => {
                    info!(list_id = %list.id(), "Left shared list");
                    self.reconciler.delete_list(list.id(), user).await?;
                    result.deleted += 1;
                    return Ok(false);
                }
                Ok(_) => {
                    self.reconciler.delete_share(&share, user).await?;
                    list.remove_share(share.email());
                    result.deleted += 1;
                }
                Err(e) => {
                    warn!(list_id = %list.id(), email = %share.email(), error = %e, "Remote share delete failed, keeping tombstone");
                    result
                        .errors
                        .push(format!("delete share {} of {}: {e}", share.email(), list.id()));
                    if own {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Returns whether the server accepted the list
    async fn push_list(
        &self,
        mut list: Shoppinglist,
        user: &User,
        result: &mut SyncResult,
    ) -> Result<bool, SyncEngineError> {
        mark_with_shares(&mut list, SyncEvent::PushStarted);
        self.reconciler.edit_list(&list, user).await?;

        let request = Request::new(StringRequest, HttpMethod::Put, list_path(user, list.id()))
            .json_body(&WireList::from(&list))?;
        let outcome = self.send(request).await;

        // a local edit may have landed while the request was in flight
        let mut current = self.reconciler.get_list(list.id(), user).await?.unwrap_or(list);
        let accepted = match outcome {
            Ok(_) => {
                mark_with_shares(&mut current, SyncEvent::PushSucceeded);
                result.pushed += 1;
                true
            }
            Err(e) => {
                warn!(list_id = %current.id(), error = %e, "List push failed");
                mark_with_shares(&mut current, SyncEvent::PushFailed);
                result.errors.push(format!("push list {}: {e}", current.id()));
                false
            }
        };
        self.reconciler.edit_list(&current, user).await?;
        Ok(accepted)
    }

    async fn push_items(
        &self,
        list_id: ListId,
        user: &User,
        result: &mut SyncResult,
    ) -> Result<(), SyncEngineError> {
        for mut item in self.reconciler.get_items(list_id, user, true).await? {
            if item.state().is_deleted() {
                let request = Request::new(StringRequest, HttpMethod::Delete, item_path(user, &item));
                match self.send(request).await {
                    Ok(_) => {
                        self.reconciler.delete_item(item.id(), user).await?;
                        result.deleted += 1;
                    }
                    Err(e) => {
                        warn!(item_id = %item.id(), error = %e, "Remote item delete failed, keeping tombstone");
                        result.errors.push(format!("delete item {}: {e}", item.id()));
                    }
                }
                continue;
            }
            if !item.state().needs_push() {
                continue;
            }

            item.mark(SyncEvent::PushStarted);
            self.reconciler.edit_item(&item, user).await?;

            let request = Request::new(StringRequest, HttpMethod::Put, item_path(user, &item))
                .json_body(&WireItem::from(&item))?;
            let outcome = self.send(request).await;

            let mut current = self.reconciler.get_item(item.id(), user).await?.unwrap_or(item);
            match outcome {
                Ok(_) => {
                    current.mark(SyncEvent::PushSucceeded);
                    result.pushed += 1;
                }
                Err(e) => {
                    warn!(item_id = %current.id(), error = %e, "Item push failed");
                    current.mark(SyncEvent::PushFailed);
                    result.errors.push(format!("push item {}: {e}", current.id()));
                }
            }
            self.reconciler.edit_item(&current, user).await?;
        }
        Ok(())
    }
}
