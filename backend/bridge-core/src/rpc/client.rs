//! RPC client: one outbound connection, concurrent in-flight calls.
//!
//! A client owns exactly one connection - a TCP stream to a daemon, or the
//! stdio pipe pair of a spawned control-plane child. Each [`RpcClient::call`]
//! gets a fresh id from an atomic counter and parks a oneshot in the
//! pending-call map; the reader task routes every inbound response to its
//! caller purely by id, so any number of calls can be in flight and each
//! resolves correctly regardless of completion order.
//!
//! Failure semantics (no hidden retries):
//! - `call()` with no open connection fails immediately with a
//!   not-connected error; calls are never queued.
//! - `disconnect()` fails every call still awaiting a response with a
//!   not-connected error.
//! - A mid-call connection drop fails every outstanding call with a
//!   connection-lost error.
//! - Reconnection is a new `connect`; failed calls are not replayed.

use crate::error::client::ClientError;
use crate::rpc::protocol::{self, RpcRequest, RpcResponse, UNKNOWN_REQUEST_ID};

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Outbound frame queue depth.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

type CallOutcome = Result<Value, ClientError>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>>;

/// Client side of the bridge connection.
///
/// Cheap to clone; clones share the connection, the id counter, and the
/// pending-call map.
#[derive(Clone)]
pub struct RpcClient {
    next_id: Arc<AtomicU64>,
    pending: PendingCalls,
    outbound_tx: Arc<Mutex<Option<mpsc::Sender<String>>>>,
    connected: Arc<AtomicBool>,
    io_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RpcClient {
    /// Connect to a TCP daemon endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connect`] if the target is unreachable.
    #[track_caller]
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self, ClientError> {
        let address = format!("{host}:{port}");
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| ClientError::Connect {
                message: format!("Failed to connect to {address}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Connected to RPC server at {address}");

        let (reader, writer) = stream.into_split();
        Ok(Self::over_streams(reader, writer))
    }

    /// Build a client over an existing duplex byte stream pair.
    ///
    /// Used by the bridge for the subprocess transport: `writer` is the
    /// child's stdin, `reader` its stdout.
    pub fn over_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);
        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let writer_task = tokio::spawn(write_frames(writer, outbound_rx));
        let reader_task = tokio::spawn(read_frames(
            reader,
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            pending,
            outbound_tx: Arc::new(Mutex::new(Some(outbound_tx))),
            connected,
            io_tasks: Arc::new(Mutex::new(vec![writer_task, reader_task])),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Invoke a method on the server and await its result.
    ///
    /// Concurrent calls on the same client are supported; each resolves
    /// independently by id.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if no connection is open (fails
    ///   immediately; the request is not queued).
    /// - [`ClientError::ConnectionLost`] if the connection drops before
    ///   the response arrives.
    /// - [`ClientError::Remote`] if the server answers with an error
    ///   response (protocol or handler error).
    #[track_caller]
    pub async fn call(&self, method: &str, params: Value) -> CallOutcome {
        let (_id, done_rx) = self.send_request(method, params).await?;

        match done_rx.await {
            Ok(outcome) => outcome,
            // The sender was dropped without a verdict - the pending map
            // went away with the connection.
            Err(_) => Err(ClientError::ConnectionLost {
                message: format!("Connection closed while awaiting response to '{method}'"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// [`RpcClient::call`] with a per-call deadline.
    ///
    /// On timeout the call fails locally and its pending entry is removed;
    /// the server is not notified and the handler may still complete
    /// server-side (at-most-once semantics). A late response for the
    /// abandoned id is dropped by the reader task.
    #[track_caller]
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> CallOutcome {
        let (id, done_rx) = self.send_request(method, params).await?;

        match tokio::time::timeout(deadline, done_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::ConnectionLost {
                message: format!("Connection closed while awaiting response to '{method}'"),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(_) => {
                // Nothing will resolve this id anymore; an entry left in
                // the map would live for the connection's lifetime.
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout {
                    message: format!("Call '{method}' timed out after {deadline:?}"),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }

    /// Number of calls still awaiting a response. Diagnostics surface; a
    /// quiescent client reports zero.
    pub async fn pending_calls(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Assign an id, park the completion oneshot, and send the frame.
    #[track_caller]
    async fn send_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(u64, oneshot::Receiver<CallOutcome>), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected {
                message: format!("Cannot call '{method}': not connected"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest::new(id, method, params);

        let (done_tx, done_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, done_tx);

        if let Err(e) = self.send_frame(protocol::to_frame(&request)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        debug!("Sent request {id} ({method})");
        Ok((id, done_rx))
    }

    /// Close the connection.
    ///
    /// Calls still awaiting a response fail with a not-connected error.
    /// There is no automatic reconnect; open a new client to reconnect.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Disconnecting RPC client");

        // Dropping the sender ends the writer task, which closes the write
        // half (or the child's stdin, letting it exit).
        self.outbound_tx.lock().await.take();

        fail_pending(&self.pending, || ClientError::NotConnected {
            message: "Disconnected while awaiting response".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
        .await;

        for task in self.io_tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    #[track_caller]
    async fn send_frame(&self, frame: String) -> Result<(), ClientError> {
        let guard = self.outbound_tx.lock().await;
        let tx = guard.as_ref().ok_or_else(|| ClientError::NotConnected {
            message: "Connection already closed".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        tx.send(frame).await.map_err(|_| ClientError::Send {
            message: "Writer task is gone".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

/// Reader task: routes inbound responses to pending callers by id.
///
/// On EOF or a read error, the connection is dead: mark disconnected and
/// fail everything still pending with a connection-lost error.
async fn read_frames<R>(reader: R, pending: PendingCalls, connected: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(frame)) => {
                if frame.trim().is_empty() {
                    continue;
                }
                route_response(&frame, &pending).await;
            }
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Error reading from server: {e}");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    fail_pending(&pending, || ClientError::ConnectionLost {
        message: "Connection to server lost".to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
    .await;
}

async fn route_response(frame: &str, pending: &PendingCalls) {
    let response: RpcResponse = match serde_json::from_str(frame) {
        Ok(response) => response,
        Err(e) => {
            warn!("Dropping unparsable response frame: {e}");
            return;
        }
    };

    let id = response.id;

    // Id 0 marks a server response to a frame it could not parse; we never
    // send unparsable frames, so nothing correlates to it.
    if id == UNKNOWN_REQUEST_ID {
        warn!("Dropping response with unknown request id");
        return;
    }

    let Some(done_tx) = pending.lock().await.remove(&id) else {
        // Late response to a timed-out or abandoned call.
        debug!("Dropping response for unknown call id {id}");
        return;
    };

    let outcome = response
        .into_outcome()
        .map_err(|rpc_error| ClientError::Remote {
            code: rpc_error.code,
            message: rpc_error.message,
            data: rpc_error.data,
            location: ErrorLocation::from(Location::caller()),
        });

    let _ = done_tx.send(outcome);
}

async fn fail_pending<F>(pending: &PendingCalls, make_error: F)
where
    F: Fn() -> ClientError,
{
    let mut map = pending.lock().await;
    for (id, done_tx) in map.drain() {
        debug!("Failing pending call {id}");
        let _ = done_tx.send(Err(make_error()));
    }
}

/// Writer task: serializes outbound frames onto the byte stream. Ends when
/// the sender side is dropped (disconnect).
async fn write_frames<W>(mut writer: W, mut outbound_rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(frame.as_bytes()).await {
            warn!("Failed to write frame: {e}");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!("Failed to flush frame: {e}");
            break;
        }
    }
}
