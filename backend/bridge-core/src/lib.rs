pub mod bridge;
pub mod config;
pub mod error;
pub mod paths;
pub mod platform;
pub mod rpc;

#[cfg(test)]
mod tests;

pub const DEVFLOW_DAEMON_BINARY: &str = "devflowd";
pub const DEVFLOW_DAEMON_HOSTNAME: &str = "127.0.0.1";
pub const DEVFLOW_DAEMON_PORT: u16 = 19711;
pub const DEVFLOW_DAEMON_ENDPOINT: &str =
    const_format::concatcp!(DEVFLOW_DAEMON_HOSTNAME, ":", DEVFLOW_DAEMON_PORT);
