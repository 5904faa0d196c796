use crate::geo::PickupLocation;
use crate::registry::Driver;

/// Picks which available driver is offered a request.
///
/// Implementations are pure: they read the candidate slice and return one of
/// its elements without touching registry state. The engine passes drivers in
/// registry order, already filtered to those that are available and have not
/// been offered this request before.
///
/// # Examples
///
/// ```rust
/// use dispatch_core::matching::{FirstAvailable, MatchingPolicy};
/// use dispatch_core::Driver;
///
/// let drivers = vec![
///     Driver::new("d1", "Ana", "PBA-1234"),
///     Driver::new("d2", "Luis", "PBC-5678"),
/// ];
/// let chosen = FirstAvailable.select_driver(&drivers, None);
/// assert_eq!(chosen.map(|d| d.id.as_str()), Some("d1"));
/// ```
pub trait MatchingPolicy: Send + Sync {
    /// Select a driver for a pickup at `location` (unknown when `None`).
    ///
    /// Must return `None` when `available` is empty.
    fn select_driver<'a>(
        &self,
        available: &'a [Driver],
        location: Option<&PickupLocation>,
    ) -> Option<&'a Driver>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
