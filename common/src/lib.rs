//! Shared data types for the devflow bridge.
//!
//! This crate contains pure data structures passed between layers. They
//! have no business logic - just data that can move between crates.
//!
//! ## Architecture
//!
//! - **common** (this crate): Pure data structures
//! - **bridge-core**: Platform detection, path resolution, RPC bridge
//! - **devflowd**: The daemon binary wiring everything together
//!
//! This layered architecture keeps concerns separated and makes testing easier.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
