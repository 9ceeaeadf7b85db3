//! ShoppinglistItem entity

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Ern, ItemId, ListId};
use super::sync_state::{SyncEvent, SyncState};

/// One entry of a shopping list
///
/// Equality is structural over id, description, count, tick, offer,
/// creator and list id; timestamps, ordering links, meta and sync state
/// do not participate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppinglistItem {
    id: ItemId,
    list_id: ListId,
    description: String,
    count: u32,
    tick: bool,
    offer_id: Option<String>,
    creator: Option<String>,
    modified: DateTime<Utc>,
    previous_id: Option<ItemId>,
    meta: serde_json::Value,
    state: SyncState,
}

impl ShoppinglistItem {
    /// Create a new unticked item with count 1, in the `ToSync` state
    pub fn new(list_id: ListId, description: impl Into<String>) -> Self {
        Self::with_id(ItemId::new(), list_id, description)
    }

    /// Create an item with a known id
    pub fn with_id(id: ItemId, list_id: ListId, description: impl Into<String>) -> Self {
        Self {
            id,
            list_id,
            description: description.into(),
            count: 1,
            tick: false,
            offer_id: None,
            creator: None,
            modified: Utc::now().trunc_subsecs(0),
            previous_id: None,
            meta: serde_json::Value::Object(serde_json::Map::new()),
            state: SyncState::ToSync,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_tick(mut self, tick: bool) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_offer_id(mut self, offer_id: Option<String>) -> Self {
        self.offer_id = offer_id;
        self
    }

    pub fn with_creator(mut self, creator: Option<String>) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    pub fn with_previous_id(mut self, previous_id: Option<ItemId>) -> Self {
        self.previous_id = previous_id;
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

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn ern(&self) -> Ern {
        self.id.ern()
    }

    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Display title; the description doubles as the title
    pub fn title(&self) -> &str {
        &self.description
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn tick(&self) -> bool {
        self.tick
    }

    pub fn offer_id(&self) -> Option<&str> {
        self.offer_id.as_deref()
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn previous_id(&self) -> Option<ItemId> {
        self.previous_id
    }

    pub fn meta(&self) -> &serde_json::Value {
        &self.meta
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn set_count(&mut self, count: u32) {
        self.count = count;
        self.touch();
    }

    pub fn set_tick(&mut self, tick: bool) {
        self.tick = tick;
        self.touch();
    }

    pub fn set_previous_id(&mut self, previous_id: Option<ItemId>) {
        self.previous_id = previous_id;
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

    pub fn mark(&mut self, event: SyncEvent) {
        self.state = self.state.apply(event);
    }

    pub fn touch(&mut self) {
        self.modified = Utc::now().trunc_subsecs(0);
    }
}

impl PartialEq for ShoppinglistItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.description == other.description
            && self.count == other.count
            && self.tick == other.tick
            && self.offer_id == other.offer_id
            && self.creator == other.creator
            && self.list_id == other.list_id
    }
}

impl Eq for ShoppinglistItem {}
