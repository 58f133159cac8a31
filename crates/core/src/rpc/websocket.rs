//! WebSocket JSON-RPC transport.
//!
//! One connection carries every request. A writer task drains an outgoing
//! queue into the socket and a reader task routes responses back to the
//! waiting caller by request id. Frames without an id are daemon
//! notifications and go to the event broadcast channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, trace, warn};

use crate::metrics::DAEMON_EVENTS;

use super::protocol::{parse_incoming, Incoming, RpcRequest};
use super::{DaemonEvent, RpcError, RpcTransport};

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>;

/// Capacity of the notification channel; slow subscribers lag.
const EVENT_BUFFER_SIZE: usize = 256;

/// Persistent WebSocket connection to the daemon.
pub struct WebSocketTransport {
    endpoint: String,
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    events: broadcast::Sender<DaemonEvent>,
    request_timeout: Option<Duration>,
    reader_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    writer_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Open the connection and start the reader and writer tasks.
    pub async fn connect(
        endpoint: &str,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, RpcError> {
        let (stream, _) = tokio::time::timeout(connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| {
                RpcError::ConnectionFailed(format!(
                    "Timed out after {:?} connecting to {}",
                    connect_timeout, endpoint
                ))
            })?
            .map_err(|e| RpcError::ConnectionFailed(e.to_string()))?;

        info!(endpoint = %endpoint, "Connected to daemon over WebSocket");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let writer_connected = connected.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!("Failed to write to daemon socket: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
            trace!("WebSocket writer stopped");
        });

        let reader_connected = connected.clone();
        let reader_pending = pending.clone();
        let reader_events = events.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        route_message(text.as_str(), &reader_pending, &reader_events).await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Daemon closed the WebSocket");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            fail_pending(&reader_pending).await;
            debug!("WebSocket reader stopped");
        });

        Ok(Self {
            endpoint: endpoint.to_string(),
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            connected,
            events,
            request_timeout,
            reader_task: std::sync::Mutex::new(Some(reader_task)),
            writer_task: std::sync::Mutex::new(Some(writer_task)),
        })
    }

    /// Whether the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn abort_reader(&self) {
        if let Ok(mut guard) = self.reader_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

async fn route_message(
    text: &str,
    pending: &Mutex<PendingMap>,
    events: &broadcast::Sender<DaemonEvent>,
) {
    match parse_incoming(text) {
        Ok(Incoming::Response { id, result }) => {
            let waiter = pending.lock().await.remove(&id);
            match waiter {
                Some(tx) => {
                    // Caller may have timed out and dropped the receiver.
                    let _ = tx.send(result);
                }
                None => trace!(id, "Response for unknown request id"),
            }
        }
        Ok(Incoming::Notification(event)) => {
            debug!(gid = %event.gid, kind = event.kind.as_str(), "Daemon notification");
            DAEMON_EVENTS.with_label_values(&[event.kind.as_str()]).inc();
            let _ = events.send(event);
        }
        Ok(Incoming::Ignored) => {}
        Err(e) => warn!("Dropping undecodable frame: {}", e),
    }
}

async fn fail_pending(pending: &Mutex<PendingMap>) {
    let drained: Vec<_> = pending.lock().await.drain().collect();
    for (_, tx) in drained {
        let _ = tx.send(Err(RpcError::ConnectionClosed));
    }
}

#[async_trait]
impl RpcTransport for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = RpcRequest::new(id, method, &params).to_json()?;
        let (tx, rx) = oneshot::channel();

        {
            // The reader clears `connected` before draining under this lock,
            // so a waiter registered here is always either failed or answered.
            let mut pending = self.pending.lock().await;
            if !self.is_connected() {
                return Err(RpcError::ConnectionClosed);
            }
            pending.insert(id, tx);
        }

        if self.outgoing.send(Message::text(text)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::ConnectionClosed);
        }
        trace!(id, method, "Sent request");

        let response = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(response) => response,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    return Err(RpcError::Timeout);
                }
            },
            None => rx.await,
        };

        response.unwrap_or(Err(RpcError::ConnectionClosed))
    }

    async fn close(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.outgoing.send(Message::Close(None));
        self.abort_reader();
        fail_pending(&self.pending).await;
        info!(endpoint = %self.endpoint, "Closed daemon WebSocket");
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<DaemonEvent>> {
        Some(self.events.subscribe())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.abort_reader();
        if let Ok(mut guard) = self.writer_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}
