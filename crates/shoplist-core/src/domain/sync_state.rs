//! Sync state machine for locally-owned entities
//!
//! Every list, item and share carries a [`SyncState`] that tracks how far its
//! local copy has converged with the remote service.
//!
//! ## State Machine
//!
//! ```text
//!            Created / LocalEdit
//!    ┌──────────────────────────────┐
//!    ▼                              │
//! ┌────────┐ PushStarted ┌─────────┐ PushSucceeded ┌────────┐
//! │ToSync  │────────────►│ Syncing │──────────────►│ Synced │
//! └────────┘             └─────────┘               └────────┘
//!    ▲  ▲                     │ PushFailed
//!    │  │  LocalEdit     ┌────▼───┐
//!    │  └────────────────│ Error  │
//!    │                   └────────┘
//!    │
//!  any state ── LocalDelete ──► Deleted (tombstone until the remote delete lands)
//! ```
//!
//! Transitions are computed by the pure function [`next_state`]; storage
//! codes are converted with [`SyncState::from_code`], which rejects every
//! value outside the closed set.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Convergence tag of a locally-owned entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Local change waiting to be pushed
    #[default]
    ToSync,
    /// Push in flight
    Syncing,
    /// Local copy matches the remote service
    Synced,
    /// Local tombstone waiting for the remote delete
    Deleted,
    /// Last push failed; retried on the next push
    Error,
}

impl SyncState {
    /// All states, in code order
    pub const ALL: [SyncState; 5] = [
        SyncState::ToSync,
        SyncState::Syncing,
        SyncState::Synced,
        SyncState::Deleted,
        SyncState::Error,
    ];

    /// Integer code used by the local store
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            SyncState::ToSync => 0,
            SyncState::Syncing => 1,
            SyncState::Synced => 2,
            SyncState::Deleted => 4,
            SyncState::Error => 5,
        }
    }

    /// Decode a storage code. Returns `None` for any code outside the closed set.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SyncState::ToSync),
            1 => Some(SyncState::Syncing),
            2 => Some(SyncState::Synced),
            4 => Some(SyncState::Deleted),
            5 => Some(SyncState::Error),
            _ => None,
        }
    }

    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::ToSync => "ToSync",
            SyncState::Syncing => "Syncing",
            SyncState::Synced => "Synced",
            SyncState::Deleted => "Deleted",
            SyncState::Error => "Error",
        }
    }

    /// Returns true if the entity has local changes the remote has not seen
    pub fn is_pending(&self) -> bool {
        !matches!(self, SyncState::Synced)
    }

    /// Returns true if the entity should be pushed with an upsert
    pub fn needs_push(&self) -> bool {
        matches!(self, SyncState::ToSync | SyncState::Error)
    }

    /// Returns true for tombstones
    pub fn is_deleted(&self) -> bool {
        matches!(self, SyncState::Deleted)
    }

    /// Apply an event, returning the resulting state
    #[must_use]
    pub fn apply(self, event: SyncEvent) -> Self {
        next_state(self, event)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::ToSync => write!(f, "to_sync"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Synced => write!(f, "synced"),
            SyncState::Deleted => write!(f, "deleted"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

impl TryFrom<i64> for SyncState {
    type Error = DomainError;

    fn try_from(code: i64) -> Result<Self, DomainError> {
        Self::from_code(code).ok_or(DomainError::InvalidStateCode(code))
    }
}

/// Something that happened to an entity, driving its sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// Entity was created locally
    Created,
    /// Entity was modified locally
    LocalEdit,
    /// A push of the entity was started
    PushStarted,
    /// The remote service accepted the push
    PushSucceeded,
    /// The push failed
    PushFailed,
    /// Entity was deleted locally
    LocalDelete,
}

/// Pure transition function of the sync state machine.
///
/// - `Created` always yields `ToSync`.
/// - `LocalDelete` always yields `Deleted`.
/// - A tombstone ignores every other event so it is never resurrected.
/// - `PushSucceeded` only completes a push that was started.
pub fn next_state(current: SyncState, event: SyncEvent) -> SyncState {
    use SyncEvent as E;
    use SyncState as S;

    match (current, event) {
        (_, E::Created) => S::ToSync,
        (_, E::LocalDelete) => S::Deleted,
        (S::Deleted, _) => S::Deleted,

        (_, E::LocalEdit) => S::ToSync,

        (S::ToSync | S::Error, E::PushStarted) => S::Syncing,
        (state, E::PushStarted) => state,

        (S::Syncing, E::PushSucceeded) => S::Synced,
        (state, E::PushSucceeded) => state,

        (S::Synced, E::PushFailed) => S::Synced,
        (_, E::PushFailed) => S::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for state in SyncState::ALL {
            assert_eq!(SyncState::from_code(state.code()), Some(state));
        }
    }

    #[test]
    fn test_invalid_codes_rejected() {
        for code in [-1, 3, 6, 100, i64::MAX] {
            assert_eq!(SyncState::from_code(code), None);
            assert_eq!(
                SyncState::try_from(code),
                Err(DomainError::InvalidStateCode(code))
            );
        }
    }

    #[test]
    fn test_creation_yields_to_sync() {
        for state in SyncState::ALL {
            assert_eq!(next_state(state, SyncEvent::Created), SyncState::ToSync);
        }
    }

    #[test]
    fn test_local_delete_from_any_state() {
        for state in SyncState::ALL {
            assert_eq!(next_state(state, SyncEvent::LocalDelete), SyncState::Deleted);
        }
    }

    #[test]
    fn test_local_edit_of_synced() {
        assert_eq!(
            next_state(SyncState::Synced, SyncEvent::LocalEdit),
            SyncState::ToSync
        );
        assert_eq!(
            next_state(SyncState::Error, SyncEvent::LocalEdit),
            SyncState::ToSync
        );
    }

    #[test]
    fn test_push_cycle() {
        let state = SyncState::ToSync
            .apply(SyncEvent::PushStarted)
            .apply(SyncEvent::PushSucceeded);
        assert_eq!(state, SyncState::Synced);

        let state = SyncState::ToSync
            .apply(SyncEvent::PushStarted)
            .apply(SyncEvent::PushFailed);
        assert_eq!(state, SyncState::Error);

        // retry from error
        assert_eq!(state.apply(SyncEvent::PushStarted), SyncState::Syncing);
    }

    #[test]
    fn test_edit_during_push_is_not_lost() {
        let state = SyncState::Syncing
            .apply(SyncEvent::LocalEdit)
            .apply(SyncEvent::PushSucceeded);
        assert_eq!(state, SyncState::ToSync);
    }

    #[test]
    fn test_tombstone_is_sticky() {
        for event in [
            SyncEvent::LocalEdit,
            SyncEvent::PushStarted,
            SyncEvent::PushSucceeded,
            SyncEvent::PushFailed,
        ] {
            assert_eq!(next_state(SyncState::Deleted, event), SyncState::Deleted);
        }
    }

    #[test]
    fn test_predicates() {
        assert!(SyncState::ToSync.needs_push());
        assert!(SyncState::Error.needs_push());
        assert!(!SyncState::Deleted.needs_push());
        assert!(SyncState::Deleted.is_pending());
        assert!(!SyncState::Synced.is_pending());
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(SyncState::ToSync.to_string(), "to_sync");
        assert_eq!(
            serde_json::to_string(&SyncState::Synced).unwrap(),
            "\"synced\""
        );
    }
}
