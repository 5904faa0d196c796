//! Dispatch throughput benchmarks using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::matching::{FirstAvailable, MatchingPolicy, NearestDriver};
use dispatch_core::test_helpers::engine_with_drivers;
use dispatch_core::{ClientId, Driver, DriverId, GeoPoint, PickupLocation, ReplyDecision};

fn driver_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("d{i}")).collect()
}

fn bench_create_and_accept(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .expect("tokio runtime");

    let mut group = c.benchmark_group("create_and_accept");
    for drivers in [10usize, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(drivers), &drivers, |b, &drivers| {
            b.to_async(&runtime).iter(|| async move {
                let ids = driver_ids(drivers);
                let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                let (engine, _notifier) = engine_with_drivers(&refs);
                for (i, id) in ids.iter().enumerate() {
                    let created = engine
                        .create_request(ClientId::new(format!("c{i}")), "Cliente", None)
                        .await;
                    black_box(created);
                    engine
                        .handle_driver_reply(&DriverId::new(id.as_str()), ReplyDecision::Accept)
                        .await;
                }
                engine.shutdown();
            });
        });
    }
    group.finish();
}

fn bench_matching_policies(c: &mut Criterion) {
    let drivers: Vec<Driver> = (0..500)
        .map(|i| {
            let offset = i as f64 * 0.0005;
            let location = GeoPoint::new(-0.30 + offset, -78.55 + offset).expect("valid point");
            Driver::new(format!("d{i}"), "Conductor", "PBA-0000").with_location(location)
        })
        .collect();
    let pickup = GeoPoint::new(-0.18, -78.47).map(PickupLocation::Coordinates);

    let policies: Vec<(&str, Box<dyn MatchingPolicy>)> = vec![
        ("first_available", Box::new(FirstAvailable)),
        ("nearest", Box::new(NearestDriver::new(None))),
        ("nearest_5km", Box::new(NearestDriver::new(Some(5.0)))),
    ];

    let mut group = c.benchmark_group("matching_policies");
    for (name, policy) in &policies {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(policy.select_driver(black_box(&drivers), pickup.as_ref())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create_and_accept, bench_matching_policies);
criterion_main!(benches);
