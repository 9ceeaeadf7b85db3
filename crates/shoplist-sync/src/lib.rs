//! shoplist-sync - Offline reconciliation and sync for shopping lists
//!
//! Provides:
//! - Permission-gated access to locally persisted lists, items and shares
//! - Share-set reconciliation against a remote snapshot
//! - A push/pull sync engine driven through the request queue
//!
//! ## Modules
//!
//! - [`permission`] - Capability checks against a list's shares
//! - [`reconciler`] - Local state operations over an [`IListStore`](shoplist_core::ports::IListStore)
//! - [`wire`] - JSON representation of lists, items and shares
//! - [`engine`] - Push/pull convergence with the remote API

pub mod engine;
pub mod permission;
pub mod reconciler;
pub mod wire;

use shoplist_core::domain::{DomainError, Email, ListId};
use shoplist_net::Fault;
use thiserror::Error;

pub use engine::{SyncEngine, SyncResult};
pub use permission::Capability;
pub use reconciler::ListReconciler;

/// Errors raised by the reconciler
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The user lacks the capability on the list, or cannot see it at all
    #[error("Permission denied: {email} may not {capability} list {list_id}")]
    PermissionDenied {
        list_id: ListId,
        email: Email,
        capability: Capability,
    },

    /// The reconciler was closed
    #[error("Reconciler is closed")]
    Closed,

    /// The local store failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Errors that abort a sync run
#[derive(Debug, Error)]
pub enum SyncEngineError {
    /// The remote request failed
    #[error("Remote request failed: {0}")]
    Remote(#[from] Fault),

    /// The request was canceled before its response was delivered
    #[error("Request canceled before delivery")]
    Canceled,

    /// A remote payload could not be mapped onto the domain model
    #[error("Invalid remote payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl From<DomainError> for SyncEngineError {
    fn from(err: DomainError) -> Self {
        SyncEngineError::Payload(err.to_string())
    }
}

impl From<serde_json::Error> for SyncEngineError {
    fn from(err: serde_json::Error) -> Self {
        SyncEngineError::Payload(err.to_string())
    }
}
