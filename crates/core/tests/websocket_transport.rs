//! WebSocket transport integration tests.
//!
//! A small in-process JSON-RPC server stands in for aria2 so the client can
//! be exercised end to end: request ids, the secret token, daemon errors,
//! notifications, and connection loss.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};

use ariaherd_core::{
    Aria2Client, DaemonConfig, DaemonEventKind, DownloadDaemon, RpcError, TaskStatus,
};

const SECRET: &str = "s3cret";

/// Answer one request the way aria2 would.
fn respond(request: &Value) -> Vec<Value> {
    let id = request["id"].clone();
    let params = request["params"].as_array().cloned().unwrap_or_default();

    let token = format!("token:{}", SECRET);
    if params.first().and_then(Value::as_str) != Some(token.as_str()) {
        return vec![json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": 1, "message": "Unauthorized"}
        })];
    }

    let result = match request["method"].as_str().unwrap_or_default() {
        "aria2.getVersion" => json!({"version": "1.37.0", "enabledFeatures": []}),
        "aria2.tellActive" => json!([{
            "gid": "2089b05ecca3d829",
            "status": "active",
            "dir": "/downloads",
            "totalLength": "2048",
            "completedLength": "1024",
            "downloadSpeed": "512",
            "uploadSpeed": "0",
            "files": [{
                "index": "1",
                "path": "/downloads/show/ep1.mkv",
                "length": "2048",
                "completedLength": "1024",
                "selected": "true"
            }]
        }]),
        "aria2.getGlobalStat" => json!({
            "downloadSpeed": "1024",
            "uploadSpeed": "0",
            "numActive": "1",
            "numWaiting": "0",
            "numStopped": "0"
        }),
        "aria2.forcePauseAll" => {
            // aria2 pushes notifications on the same socket.
            return vec![
                json!({
                    "jsonrpc": "2.0",
                    "method": "aria2.onDownloadPause",
                    "params": [{"gid": "2089b05ecca3d829"}]
                }),
                json!({"jsonrpc": "2.0", "id": id, "result": "OK"}),
            ];
        }
        "aria2.forceRemove" => {
            return vec![json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": 1, "message": "GID 0000000000000001 is not found"}
            })];
        }
        other => json!({"unexpected": other}),
    };

    vec![json!({"jsonrpc": "2.0", "id": id, "result": result})]
}

/// Serve one connection on a random port and return its endpoint.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();

            // "aria2.shutdown" drops the socket without answering.
            if request["method"] == "aria2.shutdown" {
                break;
            }
            for reply in respond(&request) {
                if ws.send(Message::text(reply.to_string())).await.is_err() {
                    return;
                }
            }
        }
    });

    format!("ws://{}/jsonrpc", addr)
}

fn daemon_config(endpoint: String) -> DaemonConfig {
    DaemonConfig {
        endpoint,
        secret: Some(SECRET.to_string()),
        request_timeout_secs: Some(5),
        connect_timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_connect_and_enumerate() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();

    let active = client.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].gid, "2089b05ecca3d829");
    assert_eq!(active[0].status, TaskStatus::Active);
    assert_eq!(active[0].total_length, 2048);
    assert_eq!(active[0].name(), "show");

    client.close().await;
}

#[tokio::test]
async fn test_global_stats_over_socket() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();

    let speed = client.global_stats().await.unwrap();
    assert_eq!((speed.download_speed, speed.upload_speed), (1024, 0));
}

#[tokio::test]
async fn test_concurrent_calls_are_routed_by_id() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();

    let (active, speed, version) = tokio::join!(
        client.list_active(),
        client.global_stats(),
        client.version()
    );

    assert_eq!(active.unwrap().len(), 1);
    assert_eq!(speed.unwrap().download_speed, 1024);
    assert_eq!(version.unwrap(), "1.37.0");
}

#[tokio::test]
async fn test_daemon_error_is_not_connection_error() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();

    let err = client.force_remove("0000000000000001").await.unwrap_err();
    assert!(matches!(err, RpcError::Daemon { code: 1, .. }));
    assert!(!err.is_connection_error());

    // The connection survives a rejected call.
    assert!(client.version().await.is_ok());
}

#[tokio::test]
async fn test_notification_is_broadcast() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    client.force_pause_all().await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.kind, DaemonEventKind::DownloadPause);
    assert_eq!(event.gid, "2089b05ecca3d829");
}

#[tokio::test]
async fn test_wrong_secret_fails_connect() {
    let endpoint = spawn_server().await;
    let mut config = daemon_config(endpoint);
    config.secret = Some("wrong".to_string());

    let err = Aria2Client::connect(config).await.err().unwrap();
    assert!(matches!(err, RpcError::ConnectionFailed(_)));
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Aria2Client::connect(daemon_config(format!("ws://{}/jsonrpc", addr)))
        .await
        .err()
        .unwrap();
    assert!(err.is_connection_error());
}

#[tokio::test]
async fn test_calls_fail_after_close() {
    let endpoint = spawn_server().await;
    let client = Aria2Client::connect(daemon_config(endpoint)).await.unwrap();

    client.close().await;
    assert!(matches!(
        client.version().await,
        Err(RpcError::NotConnected)
    ));
}
