//! Domain error types
//!
//! Errors raised while constructing or parsing domain values: identifiers,
//! resource names, e-mail addresses and sync-state codes.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Malformed entity resource name
    #[error("Invalid ERN: {0}")]
    InvalidErn(String),

    /// Sync-state code outside the closed set
    #[error("Invalid sync state code: {0}")]
    InvalidStateCode(i64),

    /// Unknown share access level
    #[error("Invalid share access: {0}")]
    InvalidAccess(String),

    /// Unknown list type
    #[error("Invalid list type: {0}")]
    InvalidListType(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
