//! Outbound notification seam.
//!
//! The engine never renders text. It hands a structured [`NotifyPayload`] to a
//! [`Notifier`], and the host decides how to turn it into a chat message and
//! deliver it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::geo::PickupLocation;
use crate::registry::DriverInfo;
use crate::requests::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    DriverOffer,
    ClientStatusUpdate,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DriverOffer => "driver_offer",
            Self::ClientStatusUpdate => "client_status_update",
        })
    }
}

/// Status pushed to a client after the initial request call has returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientStatus {
    /// The previous driver declined or timed out; a new driver was offered.
    Reassigned { driver: DriverInfo },
    /// The driver accepted the ride.
    Confirmed { driver: DriverInfo },
    NoDriverAvailable,
    /// The ride offer could not be delivered; the client should retry.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyPayload {
    DriverOffer {
        request_id: RequestId,
        client_name: String,
        location: Option<PickupLocation>,
        /// How long the driver has to answer.
        reply_within_secs: u64,
    },
    ClientStatusUpdate {
        request_id: RequestId,
        status: ClientStatus,
    },
}

impl NotifyPayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::DriverOffer { .. } => MessageKind::DriverOffer,
            Self::ClientStatusUpdate { .. } => MessageKind::ClientStatusUpdate,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            Self::DriverOffer { request_id, .. } | Self::ClientStatusUpdate { request_id, .. } => {
                *request_id
            }
        }
    }
}

/// Delivers messages to drivers and clients.
///
/// Implementations report delivery failure through [`NotifyError`]. A failed
/// driver offer ends the request as `failed`; a failed client update is only
/// logged.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, payload: NotifyPayload) -> Result<(), NotifyError>;
}
