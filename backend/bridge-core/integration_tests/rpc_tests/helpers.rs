//! Test helpers for RPC integration tests.
//!
//! This module provides utilities for testing the RPC server over TCP:
//! - Starting an ephemeral server with a fixed handler set
//! - Connecting clients
//! - Raw-frame exchange for malformed-input tests

use bridge_core::rpc::client::RpcClient;
use bridge_core::rpc::registry::{HandlerFailure, HandlerRegistry};
use bridge_core::rpc::server::{RpcServer, RpcServerHandle};

use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Delay used by the `delayed_add` handler so a concurrently submitted
/// fast call can overtake it.
pub const DELAYED_ADD_SLEEP: Duration = Duration::from_millis(200);

/// How long the `slow` handler runs; longer than the test grace period.
pub const SLOW_HANDLER_SLEEP: Duration = Duration::from_secs(30);

/// Grace period for test servers, kept short so shutdown tests finish fast.
pub const TEST_GRACE: Duration = Duration::from_millis(300);

fn require_operands(params: &Value) -> Result<(i64, i64), HandlerFailure> {
    let a = params
        .get("a")
        .and_then(Value::as_i64)
        .ok_or_else(|| HandlerFailure::new("Missing integer param 'a'"))?;
    let b = params
        .get("b")
        .and_then(Value::as_i64)
        .ok_or_else(|| HandlerFailure::new("Missing integer param 'b'"))?;
    Ok((a, b))
}

/// Build the handler set shared by the integration tests.
///
/// `ping` comes pre-registered with the registry itself.
pub fn test_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry
        .register("echo", |params| async move { Ok(params) })
        .expect("echo registers");

    registry
        .register("add", |params| async move {
            let (a, b) = require_operands(&params)?;
            Ok(json!({"result": a + b}))
        })
        .expect("add registers");

    registry
        .register("delayed_add", |params| async move {
            let (a, b) = require_operands(&params)?;
            tokio::time::sleep(DELAYED_ADD_SLEEP).await;
            Ok(json!({"result": a + b}))
        })
        .expect("delayed_add registers");

    registry
        .register("slow", |_params| async move {
            tokio::time::sleep(SLOW_HANDLER_SLEEP).await;
            Ok(json!({"done": true}))
        })
        .expect("slow registers");

    registry
        .register("fail", |_params| async move {
            Err::<Value, _>(
                HandlerFailure::new("Requested failure").with_data(json!({"reason": "test"})),
            )
        })
        .expect("fail registers");

    registry
        .register("panicking", |_params| async move {
            panic!("handler panic for testing")
        })
        .expect("panicking registers");

    registry
}

/// Test helper: Start a server with the shared handler set on an ephemeral
/// port. Returns the handle; the bound port is `handle.local_addr().port()`.
pub async fn start_test_server() -> RpcServerHandle {
    RpcServer::new(test_registry())
        .with_grace(TEST_GRACE)
        .bind("127.0.0.1", 0)
        .await
        .expect("Failed to start RPC server")
}

/// Test helper: Connect a client to a test server.
pub async fn connect_to_server(port: u16) -> RpcClient {
    RpcClient::connect_tcp("127.0.0.1", port)
        .await
        .expect("Failed to connect to RPC server")
}

/// Test helper: Exchange one raw line for one raw line over a bare TCP
/// stream, bypassing the client's framing. For malformed-input tests.
pub async fn exchange_raw_frame(stream: &mut TcpStream, frame: &str) -> Value {
    let (reader, mut writer) = stream.split();

    writer
        .write_all(frame.as_bytes())
        .await
        .expect("Failed to write frame");
    writer.write_all(b"\n").await.expect("Failed to write newline");
    writer.flush().await.expect("Failed to flush");

    let mut line = String::new();
    BufReader::new(reader)
        .read_line(&mut line)
        .await
        .expect("Failed to read response line");

    serde_json::from_str(line.trim()).expect("Response is not valid JSON")
}
