//! HTTP JSON-RPC transport: one POST per call, no notifications.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, trace};

use super::protocol::{parse_incoming, Incoming, RpcRequest};
use super::{RpcError, RpcTransport};

/// Stateless HTTP channel to the daemon.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Build the HTTP client. No request is made until the first call.
    pub fn new(
        endpoint: &str,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, RpcError> {
        let mut builder = Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RpcError::ConnectionFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }
}

/// Sort a reqwest failure into the connection or response class.
fn classify_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout
    } else if e.is_connect() {
        RpcError::ConnectionFailed(e.to_string())
    } else if e.is_decode() {
        RpcError::InvalidResponse(e.to_string())
    } else if e.is_request() || e.is_body() {
        // The daemon went away mid-exchange.
        debug!("HTTP exchange aborted: {}", e);
        RpcError::ConnectionClosed
    } else {
        RpcError::InvalidResponse(e.to_string())
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest::new(id, method, &params).to_json()?;
        trace!(id, method, "POST request");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify_error)?;

        // aria2 answers rejected calls with a 400 that still carries a
        // JSON-RPC error body, so the status alone is not conclusive.
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(classify_error)?;

        match parse_incoming(&text) {
            Ok(Incoming::Response { id: got, result }) if got == id => result,
            Ok(_) => Err(RpcError::InvalidResponse(format!(
                "HTTP {} without a matching response",
                status
            ))),
            Err(e) if !status.is_success() => {
                debug!("Undecodable error body: {}", e);
                Err(RpcError::InvalidResponse(format!("HTTP {}", status)))
            }
            Err(e) => Err(e),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
