//! Request store: canonical copies of every dispatch request and the request
//! state machine.
//!
//! ```text
//! [create] -> created
//! created  --(driver found)----------------> pending
//! created  --(nobody available)------------> no_driver     (terminal)
//! pending  --(driver accepts)--------------> accepted      (terminal)
//! pending  --(driver rejects / timeout)----> expired_reassigning
//! pending  --(offer undeliverable)---------> failed        (terminal)
//! expired_reassigning --(new driver)-------> pending
//! expired_reassigning --(pool exhausted)---> no_driver     (terminal)
//! ```
//!
//! Every transition is checked against the current state, so two racing
//! writers cannot both move a request out of `pending`: the loser gets
//! [`DispatchError::InvalidTransition`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::geo::PickupLocation;
use crate::registry::DriverId;

/// Transport address of a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Creation time in epoch milliseconds plus a store-wide sequence number, so
/// two requests created in the same millisecond never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId {
    pub created_ms: i64,
    pub sequence: u64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REQ-{}-{}", self.created_ms, self.sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Stored but not yet offered to anyone.
    Created,
    /// Offered to exactly one driver, waiting for a reply or the timeout.
    Pending,
    Accepted,
    /// The last offer was rejected or expired; a new driver is being picked.
    ExpiredReassigning,
    NoDriver,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::NoDriver | Self::Failed)
    }

    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Created, Pending)
                | (Created, NoDriver)
                | (Pending, Accepted)
                | (Pending, ExpiredReassigning)
                | (Pending, Failed)
                | (ExpiredReassigning, Pending)
                | (ExpiredReassigning, NoDriver)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::ExpiredReassigning => "expired_reassigning",
            Self::NoDriver => "no_driver",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub id: RequestId,
    pub client_id: ClientId,
    pub client_name: String,
    pub location: Option<PickupLocation>,
    pub assigned_driver: Option<DriverId>,
    pub state: RequestState,
    /// Every driver this request has been offered to, in offer order.
    pub offered_drivers: Vec<DriverId>,
    /// Number of pending cycles so far; identifies the current offer.
    pub offer_attempt: u32,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

impl DispatchRequest {
    pub fn was_offered_to(&self, driver: &DriverId) -> bool {
        self.offered_drivers.contains(driver)
    }

    /// Time from creation to acceptance; `None` unless the request was accepted.
    pub fn time_to_accept_ms(&self) -> Option<i64> {
        (self.state == RequestState::Accepted).then(|| {
            (self.last_transition_at - self.created_at)
                .num_milliseconds()
                .max(0)
        })
    }
}

#[derive(Debug, Default)]
pub struct RequestStore {
    requests: HashMap<RequestId, DispatchRequest>,
    pending_by_driver: HashMap<DriverId, RequestId>,
    next_sequence: u64,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new request in the `created` state and return a snapshot of it.
    pub fn create(
        &mut self,
        client_id: ClientId,
        client_name: impl Into<String>,
        location: Option<PickupLocation>,
    ) -> DispatchRequest {
        let now = Utc::now();
        self.next_sequence += 1;
        let id = RequestId {
            created_ms: now.timestamp_millis(),
            sequence: self.next_sequence,
        };
        let request = DispatchRequest {
            id,
            client_id,
            client_name: client_name.into(),
            location,
            assigned_driver: None,
            state: RequestState::Created,
            offered_drivers: Vec::new(),
            offer_attempt: 0,
            created_at: now,
            last_transition_at: now,
        };
        self.requests.insert(id, request.clone());
        request
    }

    pub fn get(&self, id: &RequestId) -> Result<&DispatchRequest, DispatchError> {
        self.requests
            .get(id)
            .ok_or(DispatchError::RequestNotFound(*id))
    }

    pub fn find_pending_by_driver(&self, driver: &DriverId) -> Option<&DispatchRequest> {
        self.pending_by_driver
            .get(driver)
            .and_then(|id| self.requests.get(id))
    }

    /// Record the driver about to be offered this request. Only allowed while
    /// the request is waiting for a driver (`created` or `expired_reassigning`).
    pub fn assign_driver(&mut self, id: &RequestId, driver: DriverId) -> Result<(), DispatchError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or(DispatchError::RequestNotFound(*id))?;
        if !matches!(
            request.state,
            RequestState::Created | RequestState::ExpiredReassigning
        ) {
            return Err(DispatchError::InvalidTransition {
                id: *id,
                from: request.state,
                to: RequestState::Pending,
            });
        }
        if !request.offered_drivers.contains(&driver) {
            request.offered_drivers.push(driver.clone());
        }
        request.assigned_driver = Some(driver);
        request.offer_attempt += 1;
        Ok(())
    }

    /// Move a request to `next`, returning the state it left.
    ///
    /// Fails without side effects if the move is not allowed from the current
    /// state. Entering `pending` requires an assigned driver with no other
    /// pending request.
    pub fn transition(
        &mut self,
        id: &RequestId,
        next: RequestState,
    ) -> Result<RequestState, DispatchError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or(DispatchError::RequestNotFound(*id))?;
        let current = request.state;
        if !current.can_transition_to(next) {
            return Err(DispatchError::InvalidTransition {
                id: *id,
                from: current,
                to: next,
            });
        }

        if next == RequestState::Pending {
            let driver = request.assigned_driver.clone().ok_or_else(|| {
                DispatchError::Invariant(format!("{id} entering pending without a driver"))
            })?;
            if let Some(other) = self.pending_by_driver.get(&driver) {
                if other != id {
                    return Err(DispatchError::Invariant(format!(
                        "driver {driver} already holds pending request {other}"
                    )));
                }
            }
            self.pending_by_driver.insert(driver, *id);
        } else if current == RequestState::Pending {
            if let Some(driver) = &request.assigned_driver {
                if self.pending_by_driver.get(driver) == Some(id) {
                    self.pending_by_driver.remove(driver);
                }
            }
        }

        request.state = next;
        request.last_transition_at = Utc::now();
        Ok(current)
    }

    /// Move a non-terminal request straight to `failed`, outside the normal
    /// transition table. Reserved for invariant breaks.
    pub fn force_fail(&mut self, id: &RequestId) -> Result<RequestState, DispatchError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or(DispatchError::RequestNotFound(*id))?;
        let current = request.state;
        if current.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                id: *id,
                from: current,
                to: RequestState::Failed,
            });
        }
        if let Some(driver) = &request.assigned_driver {
            if self.pending_by_driver.get(driver) == Some(id) {
                self.pending_by_driver.remove(driver);
            }
        }
        request.state = RequestState::Failed;
        request.last_transition_at = Utc::now();
        Ok(current)
    }

    /// Snapshot of every request, oldest first.
    pub fn list(&self) -> Vec<DispatchRequest> {
        let mut requests: Vec<_> = self.requests.values().cloned().collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    pub fn pending_count(&self) -> usize {
        self.pending_by_driver.len()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
