use thiserror::Error;

use crate::notifier::MessageKind;
use crate::registry::DriverId;
use crate::requests::{RequestId, RequestState};

/// Errors raised by the registry, the request store and engine construction.
///
/// Business results such as "no driver available" are never errors; they
/// travel as outcome values from the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("driver not found: {0}")]
    DriverNotFound(DriverId),

    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: RequestId,
        from: RequestState,
        to: RequestState,
    },

    #[error("driver already registered: {0}")]
    DuplicateDriver(DriverId),

    #[error("dispatch invariant violated: {0}")]
    Invariant(String),
}

/// Delivery failure reported by a [`crate::notifier::Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to deliver {kind} to {recipient}: {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub kind: MessageKind,
    pub reason: String,
}

impl NotifyError {
    pub fn new(recipient: impl Into<String>, kind: MessageKind, reason: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors while loading or validating a [`crate::config::DispatchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
