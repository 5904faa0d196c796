use crate::geo::PickupLocation;
use crate::registry::Driver;

use super::algorithm::MatchingPolicy;

/// First free driver in registry order.
///
/// Ignores the pickup location entirely. Deterministic, which makes it the
/// default policy and the one used to reason about dispatch scenarios.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl MatchingPolicy for FirstAvailable {
    fn select_driver<'a>(
        &self,
        available: &'a [Driver],
        _location: Option<&PickupLocation>,
    ) -> Option<&'a Driver> {
        available.first()
    }

    fn name(&self) -> &'static str {
        "first_available"
    }
}
