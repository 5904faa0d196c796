#![allow(dead_code)]

use dispatch_core::{ClientId, DispatchEngine, DriverId, RequestId, RequestState};

pub fn driver(id: &str) -> DriverId {
    DriverId::from(id)
}

pub fn client(id: &str) -> ClientId {
    ClientId::from(id)
}

/// Availability flag of `id` as seen through the engine.
pub fn is_available(engine: &DispatchEngine, id: &str) -> bool {
    engine
        .drivers()
        .into_iter()
        .find(|d| d.id.as_str() == id)
        .map(|d| d.available)
        .expect("driver is registered")
}

pub fn state_of(engine: &DispatchEngine, id: &RequestId) -> RequestState {
    engine.request(id).expect("request exists").state
}

pub fn assert_invariants(engine: &DispatchEngine) {
    if let Err(violation) = engine.verify_invariants() {
        panic!("dispatch invariant broken: {violation}");
    }
}
