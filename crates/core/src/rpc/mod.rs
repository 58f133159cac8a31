//! RPC channel to the download daemon.
//!
//! This module provides the `RpcTransport` trait and two implementations
//! selected by endpoint scheme: a persistent WebSocket connection (with
//! daemon notifications) and plain HTTP.

mod http;
mod protocol;
mod types;
mod websocket;

pub use http::HttpTransport;
pub use types::*;
pub use websocket::WebSocketTransport;

use std::sync::Arc;
use std::time::Duration;

use crate::config::DaemonConfig;

/// Open a transport for the configured endpoint.
pub async fn connect_transport(config: &DaemonConfig) -> Result<Arc<dyn RpcTransport>, RpcError> {
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
    let request_timeout = config.request_timeout_secs.map(Duration::from_secs);

    match config.scheme() {
        Some("ws") => Ok(Arc::new(
            WebSocketTransport::connect(&config.endpoint, connect_timeout, request_timeout).await?,
        )),
        Some("http") | Some("https") => Ok(Arc::new(HttpTransport::new(
            &config.endpoint,
            connect_timeout,
            request_timeout,
        )?)),
        _ => Err(RpcError::ConnectionFailed(format!(
            "Unsupported endpoint: {}",
            config.endpoint
        ))),
    }
}
