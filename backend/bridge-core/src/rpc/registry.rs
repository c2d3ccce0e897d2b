//! Handler registry: method name to callable mapping.
//!
//! The registry is populated during startup and frozen into an `Arc` when
//! the server starts, so dispatch needs no locking. Registering a duplicate
//! method name is rejected rather than silently overwriting - handler
//! shadowing is hard to diagnose in the field.
//!
//! `ping` is pre-registered by [`HandlerRegistry::new`] so every server
//! exposes a liveness method independent of business-logic handlers.

use crate::error::registry::RegistryError;
use crate::rpc::protocol::{HANDLER_ERROR, RpcError};

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::debug;
use serde_json::{Value, json};

/// Failure returned by a handler's business logic.
///
/// Carries a human-readable message and optionally structured `data`.
/// Defaults to the canonical handler error code; handlers exposing their
/// own error taxonomy override it with [`HandlerFailure::with_code`].
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: HANDLER_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<HandlerFailure> for RpcError {
    fn from(failure: HandlerFailure) -> Self {
        RpcError {
            code: failure.code,
            message: failure.message,
            data: failure.data,
        }
    }
}

pub type HandlerResult = Result<Value, HandlerFailure>;

/// A registered method implementation.
///
/// Boxed so the registry can hold handlers of different concrete future
/// types; `Arc` so a dispatch can hold the handler past the registry borrow.
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Mapping from method name to handler.
///
/// Mutated only during startup/registration; read-only once the server is
/// running (see [`crate::rpc::server`]).
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Create a registry with the built-in `ping` method registered.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };

        registry
            .register("ping", |_params| async { Ok(json!({"pong": true})) })
            .expect("empty registry accepts ping");

        registry
    }

    /// Register a handler under a method name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if the name is taken,
    /// including the built-in `ping`.
    #[track_caller]
    pub fn register<F, Fut>(&mut self, method: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if self.handlers.contains_key(method) {
            return Err(RegistryError::DuplicateMethod {
                method: method.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        debug!("Registered handler for method '{method}'");

        let handler: Handler = Arc::new(move |params| handler(params).boxed());
        self.handlers.insert(method.to_string(), handler);
        Ok(())
    }

    pub fn get(&self, method: &str) -> Option<Handler> {
        self.handlers.get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn methods(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
