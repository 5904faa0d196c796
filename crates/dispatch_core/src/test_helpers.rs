//! Test helpers for common test setup and utilities.
//!
//! This module provides shared fixtures so unit tests, integration tests and
//! benchmarks build engines the same way.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{DispatchConfig, DriverSeed};
use crate::engine::DispatchEngine;
use crate::error::NotifyError;
use crate::notifier::{ClientStatus, MessageKind, Notifier, NotifyPayload};
use crate::requests::RequestId;

/// One message handed to a [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: String,
    pub payload: NotifyPayload,
}

/// Notifier that records every message and can be told to fail deliveries
/// to specific recipients.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later delivery to `recipient` fail.
    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().insert(recipient.to_string());
    }

    pub fn recover(&self, recipient: &str) {
        self.failing.lock().remove(recipient);
    }

    /// Every successfully delivered message, in delivery order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Request ids of the driver offers delivered to `driver`.
    pub fn offers_to(&self, driver: &str) -> Vec<RequestId> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.recipient == driver && m.payload.kind() == MessageKind::DriverOffer)
            .map(|m| m.payload.request_id())
            .collect()
    }

    /// Status updates delivered to `client`, in delivery order.
    pub fn client_updates(&self, client: &str) -> Vec<ClientStatus> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.recipient == client)
            .filter_map(|m| match &m.payload {
                NotifyPayload::ClientStatusUpdate { status, .. } => Some(status.clone()),
                NotifyPayload::DriverOffer { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, payload: NotifyPayload) -> Result<(), NotifyError> {
        if self.failing.lock().contains(recipient) {
            return Err(NotifyError::new(recipient, payload.kind(), "recipient unreachable"));
        }
        self.sent.lock().push(SentMessage {
            recipient: recipient.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Config seeded with drivers `ids` (name = id, fixed plate), in order.
pub fn config_with_drivers(ids: &[&str]) -> DispatchConfig {
    ids.iter().fold(DispatchConfig::default(), |config, id| {
        config.with_driver(DriverSeed::new(*id, *id, format!("TST-{id}")))
    })
}

/// Engine over `config` with a fresh [`RecordingNotifier`].
pub fn engine_with_config(config: DispatchConfig) -> (DispatchEngine, Arc<RecordingNotifier>) {
    let notifier = RecordingNotifier::new();
    let engine = DispatchEngine::new(config, notifier.clone()).expect("test engine");
    (engine, notifier)
}

/// Engine with first-available matching over drivers `ids`.
pub fn engine_with_drivers(ids: &[&str]) -> (DispatchEngine, Arc<RecordingNotifier>) {
    engine_with_config(config_with_drivers(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_records_and_fails_on_demand() {
        let notifier = RecordingNotifier::new();
        let request_id = RequestId {
            created_ms: 1,
            sequence: 1,
        };
        let payload = NotifyPayload::ClientStatusUpdate {
            request_id,
            status: ClientStatus::NoDriverAvailable,
        };

        notifier.send("c1", payload.clone()).await.expect("delivered");
        notifier.fail_for("c1");
        let error = notifier.send("c1", payload.clone()).await.expect_err("fails");
        assert_eq!(error.kind, MessageKind::ClientStatusUpdate);
        notifier.recover("c1");
        notifier.send("c1", payload).await.expect("delivered again");

        assert_eq!(
            notifier.client_updates("c1"),
            vec![ClientStatus::NoDriverAvailable, ClientStatus::NoDriverAvailable]
        );
    }

    #[test]
    fn config_with_drivers_keeps_order() {
        let config = config_with_drivers(&["d1", "d2"]);
        let ids: Vec<_> = config.drivers.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2"]);
    }
}
