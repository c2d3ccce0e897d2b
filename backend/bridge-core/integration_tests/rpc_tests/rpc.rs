use crate::rpc_tests::helpers::{
    connect_to_server, exchange_raw_frame, start_test_server, test_registry,
};

use bridge_core::error::client::ClientError;
use bridge_core::rpc::client::RpcClient;
use bridge_core::rpc::server::RpcServer;
use bridge_core::rpc::protocol::{
    HANDLER_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, UNKNOWN_REQUEST_ID,
};

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpStream;

/// **VALUE**: Verifies the full round trip: connect over TCP, call the
/// built-in `ping`, receive the liveness payload.
///
/// **WHY THIS MATTERS**: This is the exact sequence the bridge runs to
/// verify a connection before declaring itself Running. If this breaks,
/// no bridge ever comes up.
///
/// **BUG THIS CATCHES**: Would catch framing, id correlation, or dispatch
/// being broken at the transport level even when every unit test passes.
#[tokio::test]
async fn given_running_server_when_ping_called_then_returns_pong() {
    // GIVEN: A server on an ephemeral port
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // WHEN: Calling ping
    let result = client.call("ping", json!({})).await.expect("ping succeeds");

    // THEN: The liveness payload
    assert_eq!(result, json!({"pong": true}));

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies params travel to the handler and results travel back
/// intact.
///
/// **BUG THIS CATCHES**: Would catch params being dropped, re-encoded
/// lossily, or attached to the wrong request.
#[tokio::test]
async fn given_echo_and_add_handlers_when_called_then_payloads_round_trip() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // Echo returns its params verbatim
    let payload = json!({"nested": {"list": [1, 2, 3]}, "flag": true});
    let echoed = client.call("echo", payload.clone()).await.expect("echo");
    assert_eq!(echoed, payload);

    // Add computes from its params
    let sum = client.call("add", json!({"a": 5, "b": 3})).await.expect("add");
    assert_eq!(sum, json!({"result": 8}));

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies an unknown method yields the canonical remote error
/// and leaves the connection usable.
///
/// **WHY THIS MATTERS**: Method typos and version skew between UI and
/// daemon surface here; they must fail one call, not the session.
#[tokio::test]
async fn given_unknown_method_when_called_then_method_not_found_and_connection_survives() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // WHEN: Calling a method nobody registered
    let error = client
        .call("no.such.method", json!({}))
        .await
        .expect_err("must fail");

    // THEN: The canonical code, as a remote error
    assert!(
        matches!(error, ClientError::Remote { code, .. } if code == METHOD_NOT_FOUND),
        "Unexpected error: {error:?}"
    );

    // AND: The same connection still serves calls
    let result = client.call("ping", json!({})).await.expect("ping still works");
    assert_eq!(result, json!({"pong": true}));

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies malformed bytes get a parse-error response tagged
/// with the unknown id and do not kill the connection.
///
/// **WHY THIS MATTERS**: Per-frame failure isolation is the protocol's
/// core robustness promise; a stray bad line from a buggy peer must not
/// tear down the session.
///
/// **BUG THIS CATCHES**: Would catch the receive loop treating a parse
/// failure as a connection error.
#[tokio::test]
async fn given_malformed_frame_when_sent_then_parse_error_and_connection_survives() {
    let mut handle = start_test_server().await;

    // GIVEN: A raw TCP connection bypassing client framing
    let mut stream = TcpStream::connect(("127.0.0.1", handle.local_addr().port()))
        .await
        .expect("connect");

    // WHEN: Sending bytes that are not JSON
    let response = exchange_raw_frame(&mut stream, "this is not json{{{").await;

    // THEN: Parse error with the unknown request id
    assert_eq!(response["error"]["code"], json!(PARSE_ERROR));
    assert_eq!(response["id"], json!(UNKNOWN_REQUEST_ID));

    // AND: The same connection still serves well-formed requests
    let response =
        exchange_raw_frame(&mut stream, r#"{"version":1,"id":9,"method":"ping"}"#).await;
    assert_eq!(response["id"], json!(9));
    assert_eq!(response["result"], json!({"pong": true}));

    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies a parseable-but-invalid envelope yields an
/// invalid-request error carrying the recovered id.
#[tokio::test]
async fn given_invalid_envelope_when_sent_then_invalid_request_with_recovered_id() {
    let mut handle = start_test_server().await;
    let mut stream = TcpStream::connect(("127.0.0.1", handle.local_addr().port()))
        .await
        .expect("connect");

    // Valid JSON, wrong shape, recoverable id
    let response = exchange_raw_frame(&mut stream, r#"{"id": 17, "method": 42}"#).await;

    assert_eq!(response["error"]["code"], json!(INVALID_REQUEST));
    assert_eq!(response["id"], json!(17));

    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies concurrent calls on one connection resolve by id,
/// with a slow call forced to complete after a fast one.
///
/// **WHY THIS MATTERS**: Out-of-order completion is the whole reason the
/// protocol carries ids; the UI fires many operations at once and each
/// must get exactly its own answer.
///
/// **BUG THIS CATCHES**: Would catch responses being matched by arrival
/// order instead of id, or a slow handler blocking the receive loop.
#[tokio::test]
async fn given_concurrent_calls_when_completion_is_out_of_order_then_each_resolves_by_id() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // WHEN: A delayed call and a fast call run concurrently
    let slow_client = client.clone();
    let slow_call =
        tokio::spawn(async move { slow_client.call("delayed_add", json!({"a": 2, "b": 3})).await });

    // The fast call overtakes the delayed one
    let fast = client
        .call("add", json!({"a": 10, "b": 20}))
        .await
        .expect("fast add");
    assert_eq!(fast, json!({"result": 30}));

    // THEN: The delayed call still resolves with its own result
    let slow = slow_call.await.expect("task").expect("delayed add");
    assert_eq!(slow, json!({"result": 5}));

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies a handler failure surfaces as a remote error with
/// its code, message, and structured data.
#[tokio::test]
async fn given_failing_handler_when_called_then_remote_error_with_data() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    let error = client.call("fail", json!({})).await.expect_err("must fail");

    match error {
        ClientError::Remote {
            code,
            message,
            data,
            ..
        } => {
            assert_eq!(code, HANDLER_ERROR);
            assert_eq!(message, "Requested failure");
            assert_eq!(data, Some(json!({"reason": "test"})));
        }
        other => panic!("Expected remote error, got: {other:?}"),
    }

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies a panicking handler produces an error response and
/// the server keeps serving.
///
/// **WHY THIS MATTERS**: A bug in one business handler must never take the
/// control plane down; panic containment is a hard server guarantee. The
/// panic payload must also not leak to the peer.
///
/// **BUG THIS CATCHES**: Would catch the dispatch path running handlers
/// inline where a panic unwinds through the connection task.
#[tokio::test]
async fn given_panicking_handler_when_called_then_error_response_and_server_survives() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // WHEN: Invoking the panicking handler
    let error = client
        .call("panicking", json!({}))
        .await
        .expect_err("must fail");

    // THEN: A handler error that does not leak the panic payload
    match &error {
        ClientError::Remote { code, message, .. } => {
            assert_eq!(*code, HANDLER_ERROR);
            assert!(
                !message.contains("handler panic for testing"),
                "Panic payload leaked to peer: {message}"
            );
        }
        other => panic!("Expected remote error, got: {other:?}"),
    }

    // AND: Both the connection and the server survive
    let result = client.call("ping", json!({})).await.expect("ping");
    assert_eq!(result, json!({"pong": true}));

    let second = connect_to_server(handle.local_addr().port()).await;
    second.call("ping", json!({})).await.expect("new connection works");

    client.disconnect().await;
    second.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies server shutdown fails outstanding calls with a
/// connection-lost error once the grace period expires.
///
/// **WHY THIS MATTERS**: Callers blocked on a dying daemon must get a
/// definitive error, not hang forever awaiting a response that will never
/// come.
///
/// **BUG THIS CATCHES**: Would catch shutdown abandoning connections
/// without closing them, leaving pending oneshots parked indefinitely.
#[tokio::test]
async fn given_outstanding_slow_call_when_server_stops_then_caller_gets_connection_lost() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    // GIVEN: A call that outlives any grace period
    let slow_client = client.clone();
    let outstanding = tokio::spawn(async move { slow_client.call("slow", json!({})).await });

    // Let the request reach the server before stopping
    tokio::time::sleep(Duration::from_millis(100)).await;

    // WHEN: Stopping the server (grace is short in tests)
    handle.stop().await.expect("stop succeeds");

    // THEN: The caller observes the lost connection
    let outcome = outstanding.await.expect("task");
    assert!(
        matches!(outcome, Err(ClientError::ConnectionLost { .. })),
        "Unexpected outcome: {outcome:?}"
    );
    assert!(!client.is_connected());
}

/// **VALUE**: Verifies calls after disconnect fail immediately with a
/// not-connected error instead of queueing.
///
/// **WHY THIS MATTERS**: Silent queueing would make the UI appear hung;
/// an immediate error lets it prompt for a reconnect.
#[tokio::test]
async fn given_disconnected_client_when_called_then_fails_immediately() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    client.disconnect().await;

    let started = std::time::Instant::now();
    let error = client.call("ping", json!({})).await.expect_err("must fail");

    assert!(matches!(error, ClientError::NotConnected { .. }));
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "Failure must be immediate, took {:?}",
        started.elapsed()
    );

    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies the per-call deadline fires while the handler is
/// still running.
///
/// **WHY THIS MATTERS**: The bridge's connect-time ping uses this; a dead
/// daemon that accepts TCP but never answers must not hang the UI.
#[tokio::test]
async fn given_slow_handler_when_called_with_deadline_then_times_out() {
    let mut handle = start_test_server().await;
    let client = connect_to_server(handle.local_addr().port()).await;

    let error = client
        .call_with_timeout("slow", json!({}), Duration::from_millis(100))
        .await
        .expect_err("must time out");

    assert!(matches!(error, ClientError::Timeout { .. }));

    // The abandoned call leaves no entry behind in the pending map
    assert_eq!(
        client.pending_calls().await,
        0,
        "Timed-out call must be removed from the pending map"
    );

    // The connection itself is still healthy
    let result = client.call("ping", json!({})).await.expect("ping");
    assert_eq!(result, json!({"pong": true}));

    client.disconnect().await;
    handle.stop().await.expect("stop succeeds");
}

/// **VALUE**: Verifies a stream-served connection drains in-flight
/// requests on the shutdown signal instead of abandoning them.
///
/// **WHY THIS MATTERS**: This is the subprocess transport's shutdown
/// path: when the daemon catches a termination signal while serving its
/// standard streams, requests already dispatched must get the grace
/// period to finish and flush their responses, same as TCP connections.
///
/// **BUG THIS CATCHES**: Would catch the serving future being dropped on
/// the signal, which cuts off in-flight responses with no drain window.
#[tokio::test]
async fn given_stream_served_connection_when_shutdown_signalled_then_in_flight_response_flushes() {
    // GIVEN: A server and client joined by an in-memory duplex pipe
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, client_write) = tokio::io::split(client_io);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server_task = tokio::spawn(
        RpcServer::new(test_registry())
            .with_grace(Duration::from_secs(2))
            .serve_streams(server_read, server_write, shutdown_rx),
    );

    let client = RpcClient::over_streams(client_read, client_write);

    // GIVEN: A request already dispatched but not yet complete
    let pending_client = client.clone();
    let in_flight = tokio::spawn(async move {
        pending_client
            .call("delayed_add", json!({"a": 2, "b": 3}))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // WHEN: Signalling shutdown mid-flight
    shutdown_tx.send(true).expect("signal shutdown");

    // THEN: The in-flight call still resolves with its result
    let outcome = in_flight.await.expect("task").expect("delayed add");
    assert_eq!(outcome, json!({"result": 5}));

    // AND: The serving future returns cleanly after the drain
    server_task
        .await
        .expect("serve task")
        .expect("serving should end cleanly");

    client.disconnect().await;
}

/// **VALUE**: Verifies stopping twice reports the server as already
/// stopped.
#[tokio::test]
async fn given_stopped_server_when_stopped_again_then_reports_already_stopped() {
    let mut handle = start_test_server().await;

    handle.stop().await.expect("first stop succeeds");

    assert!(handle.stop().await.is_err(), "Second stop must fail");
}

/// **VALUE**: Verifies ephemeral binding resolves to a usable concrete
/// port.
///
/// **WHY THIS MATTERS**: Every test in this suite depends on port-0
/// binding; two servers must never collide.
#[tokio::test]
async fn given_two_ephemeral_servers_when_bound_then_ports_differ_and_both_serve() {
    let mut first = start_test_server().await;
    let mut second = start_test_server().await;

    assert_ne!(first.local_addr().port(), 0);
    assert_ne!(first.local_addr().port(), second.local_addr().port());

    let client = connect_to_server(second.local_addr().port()).await;
    client.call("ping", json!({})).await.expect("ping");
    client.disconnect().await;

    first.stop().await.expect("stop succeeds");
    second.stop().await.expect("stop succeeds");
}
