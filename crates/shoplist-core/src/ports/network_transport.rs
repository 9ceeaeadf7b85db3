//! Network transport port (driven/secondary port)
//!
//! This module defines the single blocking I/O boundary of the request
//! dispatcher: execute one HTTP exchange and report either the raw response
//! or a transport fault.
//!
//! ## Design Notes
//!
//! - Unlike the storage port, transport failures are classified
//!   ([`TransportError`]) because the dispatcher turns them into typed
//!   network faults delivered to callers.
//! - A non-2xx status is not a transport error; interpreting status codes
//!   belongs to the request kind that parses the response.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Absolute URL including the canonical query string
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

/// Raw response as received from the wire
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport-level failure: no usable HTTP response was received
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not connect to the host
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request exceeded its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other I/O or protocol failure
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Port trait for executing HTTP exchanges
///
/// Implementations must be safe to call from several worker tasks at once.
#[async_trait::async_trait]
pub trait INetworkTransport: Send + Sync {
    /// Execute one request and return the raw response
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
