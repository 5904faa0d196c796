//! Dispatch counters: how many requests, offers, reassignments and failures the
//! engine has processed. Counters are lock-free so they can be bumped outside
//! the engine's state lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct DispatchTelemetry {
    requests_created: AtomicU64,
    offers_sent: AtomicU64,
    offers_accepted: AtomicU64,
    offers_rejected: AtomicU64,
    offers_expired: AtomicU64,
    reassignments: AtomicU64,
    no_driver: AtomicU64,
    failed: AtomicU64,
    stale_timeouts: AtomicU64,
    client_notify_failures: AtomicU64,
    drivers_released: AtomicU64,
}

/// Aggregated counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCounts {
    pub requests_created: u64,
    pub offers_sent: u64,
    pub offers_accepted: u64,
    pub offers_rejected: u64,
    pub offers_expired: u64,
    pub reassignments: u64,
    pub no_driver: u64,
    pub failed: u64,
    /// Timers that fired after their offer had already been resolved.
    pub stale_timeouts: u64,
    pub client_notify_failures: u64,
    pub drivers_released: u64,
}

impl DispatchCounts {
    /// Share of resolved offers that ended in acceptance.
    pub fn acceptance_rate(&self) -> Option<f64> {
        let resolved = self.offers_accepted + self.offers_rejected + self.offers_expired;
        (resolved > 0).then(|| self.offers_accepted as f64 / resolved as f64)
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DispatchTelemetry {
    pub fn record_request_created(&self) {
        bump(&self.requests_created);
    }

    pub fn record_offer_sent(&self) {
        bump(&self.offers_sent);
    }

    pub fn record_offer_accepted(&self) {
        bump(&self.offers_accepted);
    }

    pub fn record_offer_rejected(&self) {
        bump(&self.offers_rejected);
    }

    pub fn record_offer_expired(&self) {
        bump(&self.offers_expired);
    }

    pub fn record_reassignment(&self) {
        bump(&self.reassignments);
    }

    pub fn record_no_driver(&self) {
        bump(&self.no_driver);
    }

    pub fn record_failed(&self) {
        bump(&self.failed);
    }

    pub fn record_stale_timeout(&self) {
        bump(&self.stale_timeouts);
    }

    pub fn record_client_notify_failure(&self) {
        bump(&self.client_notify_failures);
    }

    pub fn record_driver_released(&self) {
        bump(&self.drivers_released);
    }

    pub fn snapshot(&self) -> DispatchCounts {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        DispatchCounts {
            requests_created: load(&self.requests_created),
            offers_sent: load(&self.offers_sent),
            offers_accepted: load(&self.offers_accepted),
            offers_rejected: load(&self.offers_rejected),
            offers_expired: load(&self.offers_expired),
            reassignments: load(&self.reassignments),
            no_driver: load(&self.no_driver),
            failed: load(&self.failed),
            stale_timeouts: load(&self.stale_timeouts),
            client_notify_failures: load(&self.client_notify_failures),
            drivers_released: load(&self.drivers_released),
        }
    }
}
