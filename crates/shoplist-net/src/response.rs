//! Immutable request outcome and fault taxonomy

use serde::Deserialize;
use shoplist_core::ports::TransportError;
use thiserror::Error;

use crate::cache::CacheItem;

/// Why a request did not produce a result
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Fault {
    /// No usable HTTP response (connect failure, timeout, I/O)
    #[error("network fault: {0}")]
    Network(#[from] TransportError),

    /// Well-formed transport, malformed payload
    #[error("parse fault: {0}")]
    Parse(String),

    /// Non-success status, with the structured API error when the body had one
    #[error("API error {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        details: Option<String>,
    },
}

impl Fault {
    pub fn is_network(&self) -> bool {
        matches!(self, Fault::Network(_))
    }

    /// HTTP status for API faults
    pub fn status(&self) -> Option<u16> {
        match self {
            Fault::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an API fault from a non-success response body
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct ApiErrorBody {
            code: Option<i64>,
            message: Option<String>,
            details: Option<String>,
        }

        match serde_json::from_slice::<ApiErrorBody>(body) {
            Ok(err) => Fault::Api {
                status,
                code: err.code,
                message: err.message.unwrap_or_else(|| format!("HTTP {status}")),
                details: err.details,
            },
            Err(_) => Fault::Api {
                status,
                code: None,
                message: format!("HTTP {status}"),
                details: None,
            },
        }
    }
}

/// Outcome of a request: a parsed result with its cache fragments, or a fault
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    Success { result: T, cache: Vec<CacheItem> },
    Error(Fault),
}

impl<T> Response<T> {
    /// Success without cache fragments
    pub fn success(result: T) -> Self {
        Response::Success {
            result,
            cache: Vec::new(),
        }
    }

    pub fn success_with_cache(result: T, cache: Vec<CacheItem>) -> Self {
        Response::Success { result, cache }
    }

    pub fn error(fault: Fault) -> Self {
        Response::Error(fault)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Response::Success { result, .. } => Some(result),
            Response::Error(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Response::Success { .. } => None,
            Response::Error(fault) => Some(fault),
        }
    }

    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Response::Success { result, .. } => Ok(result),
            Response::Error(fault) => Err(fault),
        }
    }

    /// Detach the cache fragments, leaving the response otherwise intact
    pub(crate) fn take_cache(&mut self) -> Vec<CacheItem> {
        match self {
            Response::Success { cache, .. } => std::mem::take(cache),
            Response::Error(_) => Vec::new(),
        }
    }
}
