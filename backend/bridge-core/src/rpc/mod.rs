//! RPC layer bridging the UI process to the control plane.
//!
//! The layer is transport-agnostic: the same newline-delimited JSON
//! envelope travels over a TCP socket (Windows UI reaching a daemon inside
//! WSL2, or any remote host) or over a spawned child's stdio pipes (Linux
//! and macOS). See:
//!
//! - [`protocol`] - wire message shapes and the error taxonomy
//! - [`registry`] - method name to handler mapping
//! - [`server`] - accepts connections and dispatches to handlers
//! - [`client`] - single-connection call interface with concurrent
//!   in-flight requests

pub mod client;
pub mod protocol;
pub mod registry;
pub mod server;

pub use client::RpcClient;
pub use protocol::{RpcError, RpcRequest, RpcResponse};
pub use registry::{HandlerFailure, HandlerRegistry};
pub use server::{RpcServer, RpcServerHandle};
