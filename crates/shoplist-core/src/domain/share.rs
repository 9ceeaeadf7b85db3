//! Share entity - a participant's access to a shopping list

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Email, ListId};
use super::sync_state::{SyncEvent, SyncState};

/// Access level of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareAccess {
    /// Full control, including deletion of the list
    #[serde(rename = "owner")]
    Owner,
    /// May edit the list and its items
    #[serde(rename = "rw")]
    ReadWrite,
    /// May only read
    #[serde(rename = "r")]
    ReadOnly,
}

impl ShareAccess {
    /// Wire representation (`owner`, `rw`, `r`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareAccess::Owner => "owner",
            ShareAccess::ReadWrite => "rw",
            ShareAccess::ReadOnly => "r",
        }
    }

    /// Returns true if this access level allows editing
    pub fn can_edit(&self) -> bool {
        matches!(self, ShareAccess::Owner | ShareAccess::ReadWrite)
    }

    /// Returns true if this access level allows destructive operations
    pub fn can_delete(&self) -> bool {
        matches!(self, ShareAccess::Owner)
    }
}

impl fmt::Display for ShareAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareAccess {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(ShareAccess::Owner),
            "rw" => Ok(ShareAccess::ReadWrite),
            "r" => Ok(ShareAccess::ReadOnly),
            other => Err(DomainError::InvalidAccess(other.to_string())),
        }
    }
}

/// A participant's access to one shopping list
///
/// [`Share::same`] compares every field except the sync state, while `==`
/// also requires the sync states to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    email: Email,
    name: Option<String>,
    access: ShareAccess,
    accepted: bool,
    accept_url: Option<String>,
    list_id: ListId,
    state: SyncState,
}

impl Share {
    /// Create a new, not yet accepted share in the `ToSync` state
    pub fn new(email: Email, access: ShareAccess, list_id: ListId) -> Self {
        Self {
            email,
            name: None,
            access,
            accepted: false,
            accept_url: None,
            list_id,
            state: SyncState::ToSync,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_accepted(mut self, accepted: bool) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn with_accept_url(mut self, url: impl Into<String>) -> Self {
        self.accept_url = Some(url.into());
        self
    }

    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = state;
        self
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn access(&self) -> ShareAccess {
        self.access
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    pub fn accept_url(&self) -> Option<&str> {
        self.accept_url.as_deref()
    }

    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn set_access(&mut self, access: ShareAccess) {
        self.access = access;
    }

    pub fn set_accepted(&mut self, accepted: bool) {
        self.accepted = accepted;
    }

    pub(crate) fn set_list_id(&mut self, list_id: ListId) {
        self.list_id = list_id;
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

    /// Returns true once the invitee has registered a display name
    pub fn has_accepted_invite(&self) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| name != self.email.as_str())
    }

    /// Compare every field except the sync state
    pub fn same(&self, other: &Share) -> bool {
        self.email == other.email
            && self.name == other.name
            && self.access == other.access
            && self.accepted == other.accepted
            && self.accept_url == other.accept_url
            && self.list_id == other.list_id
    }
}
