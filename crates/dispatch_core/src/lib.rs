//! Ride dispatch core: matches client ride requests to available drivers,
//! offers the ride, and reassigns when the driver rejects or the offer expires.
//!
//! The crate holds all shared state (driver availability and active requests)
//! and produces structured outcomes only. Chat routing, message rendering and
//! transport live in external collaborators behind the [`notifier::Notifier`]
//! seam.

pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod logging;
pub mod matching;
pub mod notifier;
pub mod registry;
pub mod requests;
pub mod telemetry;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::{DispatchConfig, DriverSeed, MatchingPolicyKind};
pub use engine::{
    CreateOutcome, CreateResult, DispatchEngine, ReleaseOutcome, ReplyDecision, ReplyOutcome,
    ReplyResult,
};
pub use error::{ConfigError, DispatchError, NotifyError};
pub use geo::{GeoPoint, PickupLocation};
pub use registry::{Driver, DriverId, DriverInfo, DriverRegistry};
pub use requests::{ClientId, DispatchRequest, RequestId, RequestState, RequestStore};
