//! RPC server: accepts connections, frames messages, dispatches handlers.
//!
//! One server hosts many concurrent connections (task-per-connection), and
//! within one connection multiple in-flight requests are dispatched
//! concurrently (task-per-request). Responses are funneled through a
//! per-connection writer task, so completion order on the wire follows
//! handler completion, not submission - callers correlate purely by id.
//!
//! A single bad frame degrades only that request: a parse failure yields a
//! parse-error response and the receive loop continues. Handler failures
//! and panics are converted to error responses tagged with the original
//! request id; a misbehaving handler cannot crash the process.
//!
//! The server performs no authorization - it assumes a trusted loopback or
//! operator-controlled network (it is not an internet-facing RPC
//! framework). Authorization, where needed, is the handler's concern.

use crate::error::server::ServerError;
use crate::rpc::protocol::{self, RpcError, RpcRequest, RpcResponse};
use crate::rpc::registry::{Handler, HandlerRegistry};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

/// Outbound frame queue depth per connection.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// How long in-flight handlers may run after shutdown is signalled.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// RPC server hosting a frozen [`HandlerRegistry`].
///
/// Serve either over TCP ([`RpcServer::bind`]) or over the current
/// process's standard streams ([`RpcServer::serve_stdio`]) - the subprocess
/// transport used when the bridge spawns the control plane as a child.
pub struct RpcServer {
    registry: Arc<HandlerRegistry>,
    grace: Duration,
}

impl RpcServer {
    /// Wrap a registry for serving. The registry is frozen here: no
    /// further registration happens once the server owns it, so dispatch
    /// reads it without locking.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Override the shutdown grace period for in-flight handlers.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Bind a TCP listener and begin accepting connections.
    ///
    /// Port `0` asks the OS for any free port; the resolved address is
    /// available via [`RpcServerHandle::local_addr`] (used by ephemeral
    /// test servers).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the port is in use, permissions are
    /// insufficient, or the interface is unavailable.
    #[track_caller]
    pub async fn bind(self, host: &str, port: u16) -> Result<RpcServerHandle, ServerError> {
        let address = format!("{host}:{port}");
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| ServerError::Bind {
                message: format!("Failed to bind {address}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let local_addr = listener.local_addr()?;

        info!("RPC server listening on {local_addr}");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(&self.registry);
        let grace = self.grace;

        let accept_task = tokio::spawn(accept_loop(listener, registry, shutdown_rx, grace));

        Ok(RpcServerHandle {
            local_addr,
            shutdown_tx,
            accept_task: Some(accept_task),
            grace,
        })
    }

    /// Serve a single connection over the current process's stdin/stdout.
    ///
    /// Runs until stdin reaches EOF (the parent hung up) or `shutdown_rx`
    /// signals, and returns `Ok` so the process can exit cleanly. On the
    /// shutdown signal, in-flight requests get the grace period to finish
    /// and flush, same as TCP connections do during [`RpcServerHandle::stop`].
    /// Diagnostics must go to stderr in this mode - stdout carries frames.
    pub async fn serve_stdio(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), ServerError> {
        info!("RPC server serving on standard streams");
        self.serve_streams(tokio::io::stdin(), tokio::io::stdout(), shutdown_rx)
            .await
    }

    /// Serve a single connection over an arbitrary byte stream pair.
    ///
    /// The counterpart of [`RpcClient::over_streams`](crate::rpc::RpcClient::over_streams):
    /// the same receive loop, drain grace, and shutdown handling as a TCP
    /// connection, over streams the caller owns.
    pub async fn serve_streams<R, W>(
        self,
        reader: R,
        writer: W,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        handle_connection(
            reader,
            writer,
            "stdio".to_string(),
            Arc::clone(&self.registry),
            shutdown_rx,
            self.grace,
        )
        .await;

        info!("Standard stream connection closed");
        Ok(())
    }
}

/// Handle to a running TCP server.
pub struct RpcServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    grace: Duration,
}

impl RpcServerHandle {
    /// The resolved listen address (meaningful after binding port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the server: close the listener and all open connections.
    ///
    /// In-flight handlers get the configured grace period to finish; after
    /// that the remaining tasks are abandoned. No new requests are accepted
    /// once this is called.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stopped`] if the server was already stopped.
    #[track_caller]
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let accept_task = self.accept_task.take().ok_or_else(|| ServerError::Stopped {
            message: "Server already stopped".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("Stopping RPC server on {}", self.local_addr);
        let _ = self.shutdown_tx.send(true);

        // Connections drain themselves within `grace`; the extra second
        // covers task scheduling slack before we abandon them.
        let abort_handle = accept_task.abort_handle();
        match tokio::time::timeout(self.grace + Duration::from_secs(1), accept_task).await {
            Ok(_) => info!("RPC server stopped"),
            Err(_) => {
                warn!("RPC server did not drain within grace period, aborting tasks");
                abort_handle.abort();
            }
        }

        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<HandlerRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) {
    let mut connections: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("Accept loop received shutdown signal");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let connection_id = Uuid::new_v4();
                        info!("Client connecting from {addr} (connection {connection_id})");

                        let (reader, writer) = stream.into_split();
                        connections.spawn(handle_connection(
                            reader,
                            writer,
                            connection_id.to_string(),
                            Arc::clone(&registry),
                            shutdown_rx.clone(),
                            grace,
                        ));
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {e}");
                    }
                }
            }
        }
    }

    // Listener drops here: no new connections. Existing connections saw the
    // same shutdown signal and drain within their own grace window.
    drop(listener);
    while connections.join_next().await.is_some() {}
}

/// Receive loop for one connection, generic over the byte stream so TCP
/// halves and stdio pipes share it.
async fn handle_connection<R, W>(
    reader: R,
    writer: W,
    connection_id: String,
    registry: Arc<HandlerRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_frames(writer, outbound_rx));

    let mut lines = BufReader::new(reader).lines();
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("Connection {connection_id} received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(frame)) => {
                        if frame.trim().is_empty() {
                            continue;
                        }
                        receive_frame(&frame, &registry, &outbound_tx, &mut in_flight, &connection_id).await;
                    }
                    Ok(None) => {
                        info!("Connection {connection_id} closed by peer");
                        break;
                    }
                    Err(e) => {
                        error!("Error reading from connection {connection_id}: {e}");
                        break;
                    }
                }
            }
        }
    }

    // Give in-flight handlers a bounded window to finish and flush their
    // responses, then abandon whatever is left.
    let drained = tokio::time::timeout(grace, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!("Connection {connection_id}: in-flight requests abandoned after grace period");
        in_flight.abort_all();
    }

    drop(outbound_tx);
    let _ = writer_task.await;
    debug!("Connection {connection_id} closed");
}

/// Parse one frame and dispatch it.
///
/// Failure handling per frame, never per connection: parse errors and
/// invalid envelopes get an error response and the loop continues; unknown
/// methods get method-not-found; everything else spawns a dispatch task.
async fn receive_frame(
    frame: &str,
    registry: &Arc<HandlerRegistry>,
    outbound_tx: &mpsc::Sender<String>,
    in_flight: &mut JoinSet<()>,
    connection_id: &str,
) {
    let request = match protocol::parse_request(frame) {
        Ok(request) => request,
        Err((id, rpc_error)) => {
            warn!(
                "Connection {connection_id}: rejecting frame ({}): {}",
                rpc_error.code, rpc_error.message
            );
            send_response(outbound_tx, RpcResponse::failure(id, rpc_error)).await;
            return;
        }
    };

    let Some(handler) = registry.get(&request.method) else {
        debug!(
            "Connection {connection_id}: method not found: {}",
            request.method
        );
        send_response(
            outbound_tx,
            RpcResponse::failure(request.id, RpcError::method_not_found(&request.method)),
        )
        .await;
        return;
    };

    let outbound_tx = outbound_tx.clone();
    in_flight.spawn(dispatch(request, handler, outbound_tx));
}

/// Run one handler and turn its outcome into a response.
///
/// The handler future runs on its own task so a panic surfaces as a
/// `JoinError` here instead of tearing down the connection; the panic
/// payload itself is not leaked to the peer.
async fn dispatch(request: RpcRequest, handler: Handler, outbound_tx: mpsc::Sender<String>) {
    let RpcRequest {
        id, method, params, ..
    } = request;

    let response = match tokio::spawn(handler(params)).await {
        Ok(Ok(result)) => RpcResponse::success(id, result),
        Ok(Err(failure)) => {
            debug!("Handler '{method}' failed: {}", failure.message);
            RpcResponse::failure(id, failure.into())
        }
        Err(join_error) => {
            error!("Handler '{method}' panicked: {join_error}");
            RpcResponse::failure(
                id,
                RpcError::handler_error(format!("Handler '{method}' failed internally")),
            )
        }
    };

    send_response(&outbound_tx, response).await;
}

async fn send_response(outbound_tx: &mpsc::Sender<String>, response: RpcResponse) {
    // A closed channel means the connection is gone; the response has
    // nowhere to go and is dropped with the connection.
    let _ = outbound_tx.send(protocol::to_frame(&response)).await;
}

/// Writer task: serializes all outbound frames for one connection onto the
/// byte stream. Exits when every sender clone is dropped.
async fn write_frames<W>(mut writer: W, mut outbound_rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            error!("Failed to write frame: {e}");
            break;
        }
        if let Err(e) = writer.flush().await {
            error!("Failed to flush frame: {e}");
            break;
        }
    }
}
