use crate::geo::PickupLocation;
use crate::registry::Driver;

use super::algorithm::MatchingPolicy;

/// Distance-based policy: the closest located driver to the pickup point.
///
/// Drivers without a known position rank after every located driver, and ties
/// keep registry order. When the pickup has no coordinates the policy falls
/// back to registry order, like [`super::FirstAvailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestDriver {
    /// Located drivers farther than this are not eligible. `None` = no limit.
    pub max_radius_km: Option<f64>,
}

impl NearestDriver {
    pub fn new(max_radius_km: Option<f64>) -> Self {
        Self { max_radius_km }
    }

    fn within_radius(&self, distance_km: f64) -> bool {
        self.max_radius_km.map_or(true, |radius| distance_km <= radius)
    }
}

impl MatchingPolicy for NearestDriver {
    fn select_driver<'a>(
        &self,
        available: &'a [Driver],
        location: Option<&PickupLocation>,
    ) -> Option<&'a Driver> {
        let Some(pickup) = location.and_then(PickupLocation::coordinates) else {
            return available.first();
        };

        let mut best: Option<(&'a Driver, f64)> = None;
        for driver in available {
            let Some(position) = driver.location else {
                continue;
            };
            let distance_km = pickup.distance_km(&position);
            if !self.within_radius(distance_km) {
                continue;
            }
            match best {
                Some((_, best_km)) if distance_km >= best_km => {}
                _ => best = Some((driver, distance_km)),
            }
        }

        best.map(|(driver, _)| driver)
            .or_else(|| available.iter().find(|d| d.location.is_none()))
    }

    fn name(&self) -> &'static str {
        "nearest"
    }
}
