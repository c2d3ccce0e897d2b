use common::ErrorLocation;

use serde_json::Value;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ClientError {
    /// Opening the transport to the server failed.
    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    /// `call()` was invoked with no open connection, or the connection was
    /// closed locally while the call was awaiting a response. Calls are
    /// never queued across connections.
    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    /// The connection dropped mid-call. All calls outstanding on the
    /// connection at that moment fail with this error.
    #[error("Connection Lost Error: {message} {location}")]
    ConnectionLost {
        message: String,
        location: ErrorLocation,
    },

    /// A per-call deadline elapsed before a response arrived. The server is
    /// not notified; the handler may still complete server-side.
    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    /// The server answered with an error response. `code` is one of the
    /// protocol codes or an application-defined handler code.
    #[error("Remote Error ({code}): {message} {location}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
        location: ErrorLocation,
    },
}
