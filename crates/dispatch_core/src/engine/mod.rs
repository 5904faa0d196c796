//! Dispatch engine: create request → match → offer → wait for reply or
//! timeout → confirm or reassign.
//!
//! All shared state (driver registry, request store, armed timers, drivers on
//! a trip) sits behind one `parking_lot::Mutex`, so a registry change and the
//! request transition it belongs to always commit together. The lock is only
//! held for in-memory bookkeeping and is released before every notifier call.
//!
//! Each pending offer owns a tokio timer task. A reply aborts it; if the abort
//! comes too late, the timer handler finds that the request has left `pending`
//! (or moved on to a newer offer attempt) and does nothing.

mod outcome;
mod timers;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::geo::{GeoPoint, PickupLocation};
use crate::matching::MatchingPolicy;
use crate::notifier::{ClientStatus, Notifier, NotifyPayload};
use crate::registry::{Driver, DriverId, DriverInfo, DriverRegistry};
use crate::requests::{ClientId, DispatchRequest, RequestId, RequestState, RequestStore};
use crate::telemetry::{DispatchCounts, DispatchTelemetry};

pub use outcome::{
    CreateOutcome, CreateResult, ReassignOutcome, ReleaseOutcome, ReplyDecision, ReplyOutcome,
    ReplyResult,
};
use timers::OfferTimers;

#[derive(Debug, Default)]
struct DispatchState {
    registry: DriverRegistry,
    requests: RequestStore,
    timers: OfferTimers,
    /// Drivers that accepted a ride and have not been released yet.
    on_trip: HashMap<DriverId, RequestId>,
}

struct EngineInner {
    config: DispatchConfig,
    policy: Box<dyn MatchingPolicy>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<DispatchState>,
    telemetry: DispatchTelemetry,
}

/// An offer committed under the lock and not yet delivered.
#[derive(Debug)]
struct PendingOffer {
    request_id: RequestId,
    attempt: u32,
    driver: DriverInfo,
    payload: NotifyPayload,
}

/// Result of sending a committed offer.
#[derive(Debug)]
enum Delivery {
    Delivered(DriverInfo),
    /// The send failed and the request was failed with it.
    Failed,
    /// The send failed after the request had already moved on to a newer
    /// offer or a terminal state. Whoever moved it on has told the client.
    Superseded,
}

/// What matching decided for a request waiting for a driver.
#[derive(Debug)]
enum OfferStep {
    Offer(PendingOffer),
    NoDriver,
    Failed,
}

/// Cheaply cloneable handle to the shared engine state.
#[derive(Clone)]
pub struct DispatchEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("policy", &self.inner.policy.name())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DispatchEngine {
    /// Build an engine with the policy named in `config.matching`.
    pub fn new(config: DispatchConfig, notifier: Arc<dyn Notifier>) -> Result<Self, DispatchError> {
        let policy = config.matching.build();
        Self::with_policy(config, policy, notifier)
    }

    /// Build an engine with a custom matching policy.
    pub fn with_policy(
        config: DispatchConfig,
        policy: Box<dyn MatchingPolicy>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, DispatchError> {
        let registry = DriverRegistry::from_drivers(config.drivers.iter().map(|s| s.to_driver()))?;
        info!(
            drivers = registry.len(),
            policy = policy.name(),
            offer_timeout_secs = config.offer_timeout_secs,
            "dispatch engine ready"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                policy,
                notifier,
                state: Mutex::new(DispatchState {
                    registry,
                    ..DispatchState::default()
                }),
                telemetry: DispatchTelemetry::default(),
            }),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    /// Create a request for a client and offer it to the first matching driver.
    ///
    /// Returns as soon as the offer is out; the driver's answer arrives later
    /// through [`DispatchEngine::handle_driver_reply`] or the offer timeout.
    pub async fn create_request(
        &self,
        client_id: ClientId,
        client_name: impl Into<String>,
        location: Option<PickupLocation>,
    ) -> CreateResult {
        let (request_id, step) = {
            let mut state = self.inner.state.lock();
            let request = state.requests.create(client_id, client_name, location);
            self.inner.telemetry.record_request_created();
            info!(
                request_id = %request.id,
                client_id = %request.client_id,
                has_location = request.location.is_some(),
                "dispatch request created"
            );
            (request.id, self.offer_or_fail(&mut state, &request.id))
        };

        let outcome = match step {
            OfferStep::Offer(offer) => match self.deliver_offer(offer).await {
                Delivery::Delivered(driver) => CreateOutcome::AssignedDriver { driver },
                Delivery::Failed => CreateOutcome::InternalError,
                Delivery::Superseded => match self.settled_outcome(&request_id) {
                    ReassignOutcome::Reassigned { driver } => {
                        CreateOutcome::AssignedDriver { driver }
                    }
                    ReassignOutcome::NoDriverAvailable => CreateOutcome::NoDriverAvailable,
                    ReassignOutcome::Failed => CreateOutcome::InternalError,
                },
            },
            OfferStep::NoDriver => CreateOutcome::NoDriverAvailable,
            OfferStep::Failed => CreateOutcome::InternalError,
        };
        CreateResult {
            request_id,
            outcome,
        }
    }

    /// Apply a driver's accept/reject to the driver's pending request, if any.
    pub async fn handle_driver_reply(
        &self,
        driver_id: &DriverId,
        decision: ReplyDecision,
    ) -> ReplyResult {
        enum Step {
            Confirmed {
                client_id: ClientId,
                driver: DriverInfo,
            },
            Reassign {
                client_id: ClientId,
                step: OfferStep,
            },
        }

        let (request_id, step) = {
            let mut state = self.inner.state.lock();
            let Some(request) = state.requests.find_pending_by_driver(driver_id).cloned() else {
                debug!(driver_id = %driver_id, ?decision, "reply without pending request ignored");
                return ReplyResult::ignored();
            };
            let id = request.id;

            if let Err(violation) = check_pending_pair(&state, &request, driver_id) {
                error!(request_id = %id, driver_id = %driver_id, %violation, "forcing request to failed");
                self.force_fail(&mut state, &id);
                return ReplyResult {
                    request_id: Some(id),
                    outcome: ReplyOutcome::InternalError,
                };
            }

            state.timers.cancel(&id);
            match decision {
                ReplyDecision::Accept => {
                    if let Err(lost) = state.requests.transition(&id, RequestState::Accepted) {
                        debug!(request_id = %id, error = %lost, "accept lost the race");
                        return ReplyResult::ignored();
                    }
                    state.on_trip.insert(driver_id.clone(), id);
                    self.inner.telemetry.record_offer_accepted();
                    info!(
                        request_id = %id,
                        driver_id = %driver_id,
                        attempt = request.offer_attempt,
                        "offer accepted"
                    );
                    let driver = state
                        .registry
                        .get(driver_id)
                        .map(Driver::info)
                        .unwrap_or_else(|| DriverInfo {
                            id: driver_id.clone(),
                            name: String::new(),
                            plate: String::new(),
                        });
                    (
                        id,
                        Step::Confirmed {
                            client_id: request.client_id,
                            driver,
                        },
                    )
                }
                ReplyDecision::Reject => {
                    if let Err(lost) = self.release_offer(&mut state, &id, driver_id) {
                        debug!(request_id = %id, error = %lost, "reject lost the race");
                        return ReplyResult::ignored();
                    }
                    self.inner.telemetry.record_offer_rejected();
                    info!(
                        request_id = %id,
                        driver_id = %driver_id,
                        attempt = request.offer_attempt,
                        "offer rejected"
                    );
                    (
                        id,
                        Step::Reassign {
                            client_id: request.client_id,
                            step: self.offer_or_fail(&mut state, &id),
                        },
                    )
                }
            }
        };

        let outcome = match step {
            Step::Confirmed { client_id, driver } => {
                self.notify_client(&client_id, request_id, ClientStatus::Confirmed { driver })
                    .await;
                ReplyOutcome::Confirmed
            }
            Step::Reassign { client_id, step } => {
                self.finish_reassignment(request_id, &client_id, step)
                    .await
                    .into()
            }
        };
        ReplyResult {
            request_id: Some(request_id),
            outcome,
        }
    }

    /// Mark a driver whose accepted ride is over as available again.
    pub fn release_driver(&self, driver_id: &DriverId) -> ReleaseOutcome {
        let mut state = self.inner.state.lock();
        if state.registry.get(driver_id).is_none() {
            return ReleaseOutcome::NotFound;
        }
        if state.requests.find_pending_by_driver(driver_id).is_some() {
            return ReleaseOutcome::StillPending;
        }
        let Some(request_id) = state.on_trip.remove(driver_id) else {
            return ReleaseOutcome::NotOnTrip;
        };
        if let Err(error) = state.registry.mark_available(driver_id) {
            warn!(driver_id = %driver_id, %error, "release of unknown driver");
            return ReleaseOutcome::NotFound;
        }
        self.inner.telemetry.record_driver_released();
        info!(driver_id = %driver_id, request_id = %request_id, "driver released after ride");
        ReleaseOutcome::Released
    }

    pub fn register_driver(&self, driver: Driver) -> Result<(), DispatchError> {
        let id = driver.id.clone();
        self.inner.state.lock().registry.register(driver)?;
        info!(driver_id = %id, "driver registered");
        Ok(())
    }

    pub fn update_driver_location(
        &self,
        driver_id: &DriverId,
        location: GeoPoint,
    ) -> Result<(), DispatchError> {
        self.inner
            .state
            .lock()
            .registry
            .update_location(driver_id, location)
    }

    pub fn is_driver(&self, identity: &str) -> bool {
        self.inner.state.lock().registry.is_driver(identity)
    }

    pub fn request(&self, id: &RequestId) -> Option<DispatchRequest> {
        self.inner.state.lock().requests.get(id).ok().cloned()
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.inner.state.lock().requests.list()
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.inner.state.lock().registry.all()
    }

    pub fn pending_request_for(&self, driver_id: &DriverId) -> Option<DispatchRequest> {
        self.inner
            .state
            .lock()
            .requests
            .find_pending_by_driver(driver_id)
            .cloned()
    }

    pub fn telemetry(&self) -> DispatchCounts {
        self.inner.telemetry.snapshot()
    }

    pub fn armed_timers(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    /// Abort every armed offer timer. Pending requests stay pending.
    pub fn shutdown(&self) {
        let aborted = self.inner.state.lock().timers.cancel_all();
        info!(aborted_timers = aborted, "dispatch engine shut down");
    }

    /// Check the cross-entity invariants: every unavailable driver is either
    /// the assigned driver of exactly one pending request or on an accepted
    /// ride, and every available driver is neither.
    pub fn verify_invariants(&self) -> Result<(), DispatchError> {
        let state = self.inner.state.lock();
        let mut pending_per_driver: HashMap<DriverId, usize> = HashMap::new();
        for request in state.requests.list() {
            if request.state != RequestState::Pending {
                continue;
            }
            let driver = request.assigned_driver.ok_or_else(|| {
                DispatchError::Invariant(format!("{} is pending without a driver", request.id))
            })?;
            *pending_per_driver.entry(driver).or_insert(0) += 1;
        }

        for driver in state.registry.all() {
            let holds = pending_per_driver.get(&driver.id).copied().unwrap_or(0)
                + usize::from(state.on_trip.contains_key(&driver.id));
            let expected = usize::from(!driver.available);
            if holds != expected {
                return Err(DispatchError::Invariant(format!(
                    "driver {} available={} but holds {holds} pending offers or rides",
                    driver.id, driver.available
                )));
            }
        }
        Ok(())
    }

    /// Treat the current offer of `request_id` as expired right away.
    #[cfg(feature = "test-helpers")]
    pub async fn expire_offer_now(&self, request_id: RequestId) -> Option<ReassignOutcome> {
        let attempt = self.request(&request_id)?.offer_attempt;
        self.fire_offer_timeout(request_id, attempt).await
    }

    /// Fire the timeout armed for offer `attempt` of `request_id` now, as the
    /// timer task would. Offers that already moved on make this a no-op.
    #[cfg(feature = "test-helpers")]
    pub async fn fire_offer_timeout(
        &self,
        request_id: RequestId,
        attempt: u32,
    ) -> Option<ReassignOutcome> {
        self.inner
            .state
            .lock()
            .timers
            .cancel_attempt(&request_id, attempt);
        self.on_offer_timeout(request_id, attempt).await
    }

    async fn on_offer_timeout(&self, id: RequestId, attempt: u32) -> Option<ReassignOutcome> {
        let (client_id, step) = {
            let mut state = self.inner.state.lock();
            state.timers.disarm_fired(&id, attempt);

            let request = state.requests.get(&id).ok()?;
            if request.state != RequestState::Pending || request.offer_attempt != attempt {
                self.inner.telemetry.record_stale_timeout();
                debug!(
                    request_id = %id,
                    attempt,
                    state = %request.state,
                    current_attempt = request.offer_attempt,
                    "stale offer timeout ignored"
                );
                return None;
            }
            let client_id = request.client_id.clone();
            let Some(driver_id) = request.assigned_driver.clone() else {
                error!(request_id = %id, "pending request without driver at timeout");
                self.force_fail(&mut state, &id);
                return Some(ReassignOutcome::Failed);
            };

            if let Err(error) = self.release_offer(&mut state, &id, &driver_id) {
                debug!(request_id = %id, %error, "timeout lost the race");
                return None;
            }
            self.inner.telemetry.record_offer_expired();
            info!(request_id = %id, driver_id = %driver_id, attempt, "offer expired");
            (client_id, self.offer_or_fail(&mut state, &id))
        };

        Some(self.finish_reassignment(id, &client_id, step).await)
    }

    /// Move a pending request to `expired_reassigning` and free its driver.
    fn release_offer(
        &self,
        state: &mut DispatchState,
        id: &RequestId,
        driver_id: &DriverId,
    ) -> Result<(), DispatchError> {
        state
            .requests
            .transition(id, RequestState::ExpiredReassigning)?;
        state.registry.mark_available(driver_id)
    }

    /// Pick the next driver for a request waiting for one and commit the offer.
    ///
    /// Drivers already offered this request are skipped. Unexpected store or
    /// registry errors force the request to `failed`.
    fn offer_or_fail(&self, state: &mut DispatchState, id: &RequestId) -> OfferStep {
        match self.try_offer(state, id) {
            Ok(Some(offer)) => OfferStep::Offer(offer),
            Ok(None) => OfferStep::NoDriver,
            Err(violation) => {
                error!(request_id = %id, %violation, "matching failed, forcing request to failed");
                self.force_fail(state, id);
                OfferStep::Failed
            }
        }
    }

    fn try_offer(
        &self,
        state: &mut DispatchState,
        id: &RequestId,
    ) -> Result<Option<PendingOffer>, DispatchError> {
        let request = state.requests.get(id)?.clone();

        let cap_reached = self
            .inner
            .config
            .max_offer_attempts
            .is_some_and(|max| request.offer_attempt >= max);
        let candidates: Vec<Driver> = if cap_reached {
            Vec::new()
        } else {
            state
                .registry
                .list_available()
                .into_iter()
                .filter(|driver| !request.was_offered_to(&driver.id))
                .collect()
        };

        let Some(driver) = self
            .inner
            .policy
            .select_driver(&candidates, request.location.as_ref())
            .cloned()
        else {
            state.requests.transition(id, RequestState::NoDriver)?;
            self.inner.telemetry.record_no_driver();
            info!(
                request_id = %id,
                offers = request.offered_drivers.len(),
                cap_reached,
                "no driver available"
            );
            return Ok(None);
        };

        state.requests.assign_driver(id, driver.id.clone())?;
        state.requests.transition(id, RequestState::Pending)?;
        state.registry.mark_busy(&driver.id)?;
        let attempt = request.offer_attempt + 1;
        self.arm_timer(state, *id, attempt);
        info!(
            request_id = %id,
            driver_id = %driver.id,
            attempt,
            policy = self.inner.policy.name(),
            "driver offered"
        );

        Ok(Some(PendingOffer {
            request_id: *id,
            attempt,
            driver: driver.info(),
            payload: NotifyPayload::DriverOffer {
                request_id: *id,
                client_name: request.client_name,
                location: request.location,
                reply_within_secs: self.inner.config.offer_timeout_secs,
            },
        }))
    }

    fn arm_timer(&self, state: &mut DispatchState, id: RequestId, attempt: u32) {
        let engine = self.clone();
        let timeout = self.inner.config.offer_timeout();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            engine.on_offer_timeout(id, attempt).await;
        });
        state.timers.arm(id, attempt, task.abort_handle());
    }

    /// Send a committed offer. On delivery failure the request ends as
    /// `failed` and its driver is released, unless it already moved on.
    async fn deliver_offer(&self, offer: PendingOffer) -> Delivery {
        let PendingOffer {
            request_id,
            attempt,
            driver,
            payload,
        } = offer;

        let error = match self.inner.notifier.send(driver.id.as_str(), payload).await {
            Ok(()) => {
                self.inner.telemetry.record_offer_sent();
                return Delivery::Delivered(driver);
            }
            Err(error) => error,
        };

        warn!(request_id = %request_id, driver_id = %driver.id, %error, "driver offer not delivered");
        let mut state = self.inner.state.lock();
        let still_current = state.requests.get(&request_id).is_ok_and(|request| {
            request.state == RequestState::Pending
                && request.offer_attempt == attempt
                && request.assigned_driver.as_ref() == Some(&driver.id)
        });
        if !still_current {
            debug!(request_id = %request_id, attempt, "undelivered offer already superseded");
            return Delivery::Superseded;
        }
        state.timers.cancel(&request_id);
        if let Err(error) = state.requests.transition(&request_id, RequestState::Failed) {
            debug!(request_id = %request_id, %error, "failure lost the race");
            return Delivery::Superseded;
        }
        if let Err(error) = state.registry.mark_available(&driver.id) {
            error!(driver_id = %driver.id, %error, "failed to release driver");
        }
        self.inner.telemetry.record_failed();
        info!(request_id = %request_id, "request failed");
        Delivery::Failed
    }

    /// Where a request stands now, for callers whose own offer was overtaken.
    fn settled_outcome(&self, id: &RequestId) -> ReassignOutcome {
        let state = self.inner.state.lock();
        let Ok(request) = state.requests.get(id) else {
            return ReassignOutcome::Failed;
        };
        let current_driver = request
            .assigned_driver
            .as_ref()
            .and_then(|driver_id| state.registry.get(driver_id))
            .map(Driver::info);
        match (request.state, current_driver) {
            (RequestState::Pending | RequestState::Accepted, Some(driver)) => {
                ReassignOutcome::Reassigned { driver }
            }
            (RequestState::NoDriver, _) => ReassignOutcome::NoDriverAvailable,
            _ => ReassignOutcome::Failed,
        }
    }

    async fn finish_reassignment(
        &self,
        request_id: RequestId,
        client_id: &ClientId,
        step: OfferStep,
    ) -> ReassignOutcome {
        let (outcome, status) = match step {
            OfferStep::Offer(offer) => match self.deliver_offer(offer).await {
                Delivery::Delivered(driver) => {
                    self.inner.telemetry.record_reassignment();
                    (
                        ReassignOutcome::Reassigned {
                            driver: driver.clone(),
                        },
                        ClientStatus::Reassigned { driver },
                    )
                }
                Delivery::Failed => (ReassignOutcome::Failed, ClientStatus::Failed),
                Delivery::Superseded => return self.settled_outcome(&request_id),
            },
            OfferStep::NoDriver => (
                ReassignOutcome::NoDriverAvailable,
                ClientStatus::NoDriverAvailable,
            ),
            OfferStep::Failed => (ReassignOutcome::Failed, ClientStatus::Failed),
        };
        self.notify_client(client_id, request_id, status).await;
        outcome
    }

    /// Best-effort client update; failures are logged, never rolled back.
    async fn notify_client(&self, client_id: &ClientId, request_id: RequestId, status: ClientStatus) {
        let payload = NotifyPayload::ClientStatusUpdate { request_id, status };
        if let Err(error) = self.inner.notifier.send(client_id.as_str(), payload).await {
            self.inner.telemetry.record_client_notify_failure();
            warn!(request_id = %request_id, client_id = %client_id, %error, "client update not delivered");
        }
    }

    /// Force a request to `failed` and release its driver, favouring safety
    /// over liveness.
    fn force_fail(&self, state: &mut DispatchState, id: &RequestId) {
        state.timers.cancel(id);
        let assigned = state
            .requests
            .get(id)
            .ok()
            .and_then(|request| request.assigned_driver.clone());
        match state.requests.force_fail(id) {
            Ok(previous) => {
                self.inner.telemetry.record_failed();
                if previous == RequestState::Pending {
                    if let Some(driver) = assigned {
                        if let Err(error) = state.registry.mark_available(&driver) {
                            error!(driver_id = %driver, %error, "failed to release driver");
                        }
                    }
                }
            }
            Err(error) => debug!(request_id = %id, %error, "request already terminal"),
        }
    }
}

/// The replying driver must be the request's assigned driver and must be
/// marked busy while the request is pending.
fn check_pending_pair(
    state: &DispatchState,
    request: &DispatchRequest,
    driver_id: &DriverId,
) -> Result<(), DispatchError> {
    if request.assigned_driver.as_ref() != Some(driver_id) {
        return Err(DispatchError::Invariant(format!(
            "pending index maps {driver_id} to {} assigned to {:?}",
            request.id, request.assigned_driver
        )));
    }
    if state.registry.is_available(driver_id) != Some(false) {
        return Err(DispatchError::Invariant(format!(
            "driver {driver_id} holds pending {} but is not marked busy",
            request.id
        )));
    }
    Ok(())
}

#[cfg(all(test, feature = "test-helpers"))]
mod tests {
    use super::*;
    use crate::test_helpers::engine_with_drivers;

    fn d1() -> DriverId {
        DriverId::from("d1")
    }

    #[tokio::test(start_paused = true)]
    async fn reply_with_driver_wrongly_available_forces_failure() {
        let (engine, notifier) = engine_with_drivers(&["d1", "d2"]);
        let created = engine
            .create_request(ClientId::from("c1"), "Carla", None)
            .await;
        engine
            .inner
            .state
            .lock()
            .registry
            .mark_available(&d1())
            .expect("known driver");
        assert!(engine.verify_invariants().is_err());

        let reply = engine.handle_driver_reply(&d1(), ReplyDecision::Accept).await;

        assert_eq!(reply.request_id, Some(created.request_id));
        assert_eq!(reply.outcome, ReplyOutcome::InternalError);
        let request = engine.request(&created.request_id).expect("request");
        assert_eq!(request.state, RequestState::Failed);
        assert_eq!(engine.armed_timers(), 0);
        assert!(engine.pending_request_for(&d1()).is_none());
        assert!(engine.drivers().iter().all(|d| d.available));
        assert_eq!(engine.telemetry().failed, 1);
        assert_eq!(engine.verify_invariants(), Ok(()));
        assert!(notifier.client_updates("c1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn forced_failure_releases_pending_driver_and_leaves_terminal_alone() {
        let (engine, _notifier) = engine_with_drivers(&["d1"]);
        let created = engine
            .create_request(ClientId::from("c1"), "Carla", None)
            .await;
        let id = created.request_id;

        {
            let mut state = engine.inner.state.lock();
            engine.force_fail(&mut state, &id);
        }
        assert_eq!(engine.request(&id).map(|r| r.state), Some(RequestState::Failed));
        assert!(engine.drivers()[0].available);
        assert_eq!(engine.armed_timers(), 0);
        assert_eq!(engine.verify_invariants(), Ok(()));

        let frozen = engine.request(&id);
        {
            let mut state = engine.inner.state.lock();
            engine.force_fail(&mut state, &id);
        }
        assert_eq!(engine.request(&id), frozen);
        assert_eq!(engine.telemetry().failed, 1);
    }
}
