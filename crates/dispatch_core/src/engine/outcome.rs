use serde::{Deserialize, Serialize};

use crate::registry::DriverInfo;
use crate::requests::RequestId;

/// A driver's answer to an offer, as recognised by the conversation adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyDecision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// The driver has been offered the ride and is waiting to answer.
    AssignedDriver { driver: DriverInfo },
    NoDriverAvailable,
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    pub request_id: RequestId,
    pub outcome: CreateOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplyOutcome {
    Confirmed,
    /// The replying driver had nothing pending; the reply was ignored.
    NoPendingRequest,
    Reassigned { driver: DriverInfo },
    NoDriverAvailable,
    InternalError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyResult {
    /// `None` when the reply matched no pending request.
    pub request_id: Option<RequestId>,
    pub outcome: ReplyOutcome,
}

impl ReplyResult {
    pub(crate) fn ignored() -> Self {
        Self {
            request_id: None,
            outcome: ReplyOutcome::NoPendingRequest,
        }
    }
}

/// Result of re-entering matching after a reject or an expired offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReassignOutcome {
    Reassigned { driver: DriverInfo },
    NoDriverAvailable,
    Failed,
}

impl From<ReassignOutcome> for ReplyOutcome {
    fn from(outcome: ReassignOutcome) -> Self {
        match outcome {
            ReassignOutcome::Reassigned { driver } => Self::Reassigned { driver },
            ReassignOutcome::NoDriverAvailable => Self::NoDriverAvailable,
            ReassignOutcome::Failed => Self::InternalError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The driver finished an accepted ride and is available again.
    Released,
    NotOnTrip,
    /// The driver still holds an unanswered offer and cannot be released.
    StillPending,
    NotFound,
}
