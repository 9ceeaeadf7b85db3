//! Shoppinglist entity
//!
//! A list owns its shares (keyed by participant e-mail) and refers to its
//! items by id only; items are loaded separately through the list store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Email, Ern, ListId};
use super::share::{Share, ShareAccess};
use super::sync_state::{SyncEvent, SyncState};

/// Kind of list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    #[default]
    ShoppingList,
    WishList,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::ShoppingList => "shopping_list",
            ListType::WishList => "wish_list",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shopping_list" => Ok(ListType::ShoppingList),
            "wish_list" => Ok(ListType::WishList),
            other => Err(DomainError::InvalidListType(other.to_string())),
        }
    }
}

/// A shared, offline-editable shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shoppinglist {
    id: ListId,
    name: String,
    modified: DateTime<Utc>,
    previous_id: Option<ListId>,
    list_type: ListType,
    meta: serde_json::Value,
    state: SyncState,
    shares: BTreeMap<Email, Share>,
}

impl Shoppinglist {
    /// Create a new list owned by `owner`, in the `ToSync` state
    pub fn new(name: impl Into<String>, owner: Email) -> Self {
        let id = ListId::new();
        let mut shares = BTreeMap::new();
        let owner_share = Share::new(owner.clone(), ShareAccess::Owner, id).with_accepted(true);
        shares.insert(owner, owner_share);
        Self {
            id,
            name: name.into(),
            modified: now(),
            previous_id: None,
            list_type: ListType::ShoppingList,
            meta: serde_json::Value::Object(serde_json::Map::new()),
            state: SyncState::ToSync,
            shares,
        }
    }

    /// Rebuild a list from persisted or remote fields, without shares
    pub fn from_parts(id: ListId, name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            modified,
            previous_id: None,
            list_type: ListType::ShoppingList,
            meta: serde_json::Value::Object(serde_json::Map::new()),
            state: SyncState::ToSync,
            shares: BTreeMap::new(),
        }
    }

    pub fn with_previous_id(mut self, previous_id: Option<ListId>) -> Self {
        self.previous_id = previous_id;
        self
    }

    pub fn with_list_type(mut self, list_type: ListType) -> Self {
        self.list_type = list_type;
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = state;
        self
    }

    // --- accessors ---

    pub fn id(&self) -> ListId {
        self.id
    }

    pub fn ern(&self) -> Ern {
        self.id.ern()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn previous_id(&self) -> Option<ListId> {
        self.previous_id
    }

    pub fn list_type(&self) -> ListType {
        self.list_type
    }

    pub fn meta(&self) -> &serde_json::Value {
        &self.meta
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    // --- mutation ---

    /// Rename the list, bumping its modified time
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_previous_id(&mut self, previous_id: Option<ListId>) {
        self.previous_id = previous_id;
    }

    pub fn set_meta(&mut self, meta: serde_json::Value) {
        self.meta = meta;
    }

    pub fn set_modified(&mut self, modified: DateTime<Utc>) {
        self.modified = modified;
    }

    pub fn set_state(&mut self, state: SyncState) {
        self.state = state;
    }

    /// Set the state from a storage code. Invalid codes leave the state unchanged.
    pub fn apply_state_code(&mut self, code: i64) -> bool {
        match SyncState::from_code(code) {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }

    /// Feed an event into the sync state machine
    pub fn mark(&mut self, event: SyncEvent) {
        self.state = self.state.apply(event);
    }

    /// Set the modified time to now (second precision)
    pub fn touch(&mut self) {
        self.modified = now();
    }

    // --- shares ---

    pub fn shares(&self) -> &BTreeMap<Email, Share> {
        &self.shares
    }

    pub fn share(&self, email: &Email) -> Option<&Share> {
        self.shares.get(email)
    }

    /// Add or replace a share; the share is re-pointed at this list
    pub fn put_share(&mut self, mut share: Share) {
        share.set_list_id(self.id);
        self.shares.insert(share.email().clone(), share);
    }

    pub fn remove_share(&mut self, email: &Email) -> Option<Share> {
        self.shares.remove(email)
    }

    /// Replace every share at once
    pub fn set_shares(&mut self, shares: impl IntoIterator<Item = Share>) {
        self.shares.clear();
        for share in shares {
            self.put_share(share);
        }
    }

    /// The first share with owner access
    pub fn owner(&self) -> Option<&Share> {
        self.shares
            .values()
            .find(|s| s.access() == ShareAccess::Owner)
    }

    /// Returns true if `email` participates in this list
    pub fn is_visible_to(&self, email: &Email) -> bool {
        self.shares.contains_key(email)
    }

    /// Compare every field except the sync state, shares included
    pub fn same(&self, other: &Shoppinglist) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.modified == other.modified
            && self.previous_id == other.previous_id
            && self.list_type == other.list_type
            && self.meta == other.meta
            && self.shares.len() == other.shares.len()
            && self.shares.iter().all(|(email, share)| {
                other
                    .shares
                    .get(email)
                    .is_some_and(|theirs| share.same(theirs))
            })
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
