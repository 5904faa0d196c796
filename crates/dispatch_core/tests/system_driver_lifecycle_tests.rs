mod support;

use dispatch_core::test_helpers::{config_with_drivers, engine_with_config, engine_with_drivers};
use dispatch_core::{
    CreateOutcome, DispatchError, Driver, DriverSeed, GeoPoint, MatchingPolicyKind,
    PickupLocation, ReleaseOutcome, ReplyDecision,
};
use support::{assert_invariants, client, driver, is_available};

fn point(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).expect("valid point")
}

#[tokio::test(start_paused = true)]
async fn released_driver_can_take_the_next_ride() {
    let (engine, _notifier) = engine_with_drivers(&["d1"]);
    engine.create_request(client("c1"), "Carla", None).await;

    assert_eq!(engine.release_driver(&driver("d1")), ReleaseOutcome::StillPending);
    engine
        .handle_driver_reply(&driver("d1"), ReplyDecision::Accept)
        .await;

    let busy = engine.create_request(client("c2"), "Diego", None).await;
    assert_eq!(busy.outcome, CreateOutcome::NoDriverAvailable);

    assert_eq!(engine.release_driver(&driver("d1")), ReleaseOutcome::Released);
    assert!(is_available(&engine, "d1"));
    assert_eq!(engine.release_driver(&driver("d1")), ReleaseOutcome::NotOnTrip);
    assert_eq!(engine.release_driver(&driver("dx")), ReleaseOutcome::NotFound);

    let next = engine.create_request(client("c2"), "Diego", None).await;
    assert!(matches!(next.outcome, CreateOutcome::AssignedDriver { ref driver } if driver.id.as_str() == "d1"));
    assert_eq!(engine.telemetry().drivers_released, 1);
    assert_invariants(&engine);
}

#[tokio::test(start_paused = true)]
async fn drivers_registered_at_runtime_join_the_pool() {
    let (engine, notifier) = engine_with_drivers(&[]);
    assert!(!engine.is_driver("d9"));

    engine
        .register_driver(Driver::new("d9", "Nube", "PBA-0909"))
        .expect("new driver");
    assert!(engine.is_driver("d9"));
    assert_eq!(
        engine.register_driver(Driver::new("d9", "Otra", "PBA-0000")),
        Err(DispatchError::DuplicateDriver(driver("d9")))
    );

    let created = engine.create_request(client("c1"), "Carla", None).await;
    assert!(matches!(created.outcome, CreateOutcome::AssignedDriver { ref driver } if driver.plate == "PBA-0909"));
    assert_eq!(notifier.offers_to("d9"), vec![created.request_id]);
}

#[tokio::test(start_paused = true)]
async fn nearest_policy_follows_driver_positions() {
    let config = config_with_drivers(&[])
        .with_matching(MatchingPolicyKind::Nearest {
            max_radius_km: Some(20.0),
        })
        .with_driver(DriverSeed {
            location: Some(point(-0.25, -78.52)),
            ..DriverSeed::new("south", "Sur", "PBA-1000")
        })
        .with_driver(DriverSeed {
            location: Some(point(-0.10, -78.48)),
            ..DriverSeed::new("north", "Norte", "PBA-2000")
        });
    let (engine, _notifier) = engine_with_config(config);
    let pickup = Some(PickupLocation::Coordinates(point(-0.11, -78.48)));

    let first = engine
        .create_request(client("c1"), "Carla", pickup.clone())
        .await;
    assert!(matches!(first.outcome, CreateOutcome::AssignedDriver { ref driver } if driver.id.as_str() == "north"));
    engine
        .handle_driver_reply(&driver("north"), ReplyDecision::Accept)
        .await;
    engine.release_driver(&driver("north"));

    engine
        .update_driver_location(&driver("north"), point(-0.40, -78.60))
        .expect("known driver");
    engine
        .update_driver_location(&driver("south"), point(-0.12, -78.49))
        .expect("known driver");
    let second = engine.create_request(client("c2"), "Diego", pickup).await;
    assert!(matches!(second.outcome, CreateOutcome::AssignedDriver { ref driver } if driver.id.as_str() == "south"));

    assert_eq!(
        engine.update_driver_location(&driver("ghost"), point(0.0, 0.0)),
        Err(DispatchError::DriverNotFound(driver("ghost")))
    );
}

#[tokio::test(start_paused = true)]
async fn described_pickup_uses_registry_order_under_nearest() {
    let config = config_with_drivers(&["d1", "d2"]).with_matching(MatchingPolicyKind::Nearest {
        max_radius_km: None,
    });
    let (engine, _notifier) = engine_with_config(config);

    let created = engine
        .create_request(
            client("c1"),
            "Carla",
            PickupLocation::from_text("Parque La Carolina, entrada norte"),
        )
        .await;
    assert!(matches!(created.outcome, CreateOutcome::AssignedDriver { ref driver } if driver.id.as_str() == "d1"));
}
