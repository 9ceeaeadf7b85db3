//! HTTP transport adapter
//!
//! Implements [`INetworkTransport`] over `reqwest`. Status codes are passed
//! through untouched; only failures to obtain a response are errors here.

use std::time::Duration;

use reqwest::{Client, Method};
use shoplist_core::ports::{
    HttpMethod, INetworkTransport, TransportError, TransportRequest, TransportResponse,
};
use tracing::trace;

use crate::NetError;

/// `reqwest`-backed transport shared by all dispatcher workers
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport that identifies itself with `user_agent`
    pub fn new(user_agent: &str) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

#[async_trait::async_trait]
impl INetworkTransport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut builder = self
            .client
            .request(method(request.method), request.url.as_str())
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, timeout))?
            .to_vec();

        trace!(url = %request.url, status, bytes = body.len(), "HTTP exchange complete");
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
