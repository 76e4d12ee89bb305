//! Master directory tests
//!
//! Covers registration upserts, replace-by-city aggregation, relocation of
//! aggregated copies and nearest-server routing.

mod common;

use std::sync::Arc;

use common::{register_request, sync_data};
use pawmatch::directory::{haversine_km, Directory, RegisterOutcome};
use pawmatch::storage::{Backend, Collection, MemoryBackend};
use proptest::prelude::*;

fn directory() -> Directory {
    Directory::load(Arc::new(MemoryBackend::new()))
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_is_idempotent_per_city() {
    let mut directory = directory();

    let mut first = register_request("Toulouse", 43.6047, 1.4442);
    first.url = "http://old.toulouse.test".to_string();
    assert_eq!(directory.register(first).unwrap(), RegisterOutcome::Created);

    let mut second = register_request("Toulouse", 43.6047, 1.4442);
    second.url = "http://new.toulouse.test".to_string();
    second.animal_count = 8;
    assert_eq!(directory.register(second).unwrap(), RegisterOutcome::Updated);

    assert_eq!(directory.cities().len(), 1);
    assert_eq!(directory.cities()[0].url, "http://new.toulouse.test");
    assert_eq!(directory.stats().servers[0].animal_count, 8);
}

#[test]
fn test_registration_order_is_preserved() {
    let mut directory = directory();
    for city in ["Toulouse", "Montpellier", "Paris"] {
        directory.register(register_request(city, 45.0, 2.0)).unwrap();
    }
    directory.register(register_request("Toulouse", 43.6, 1.44)).unwrap();

    let names: Vec<&str> = directory.cities().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Toulouse", "Montpellier", "Paris"]);
}

// ============================================================================
// Aggregation
// ============================================================================

#[test]
fn test_sync_replaces_only_the_pushing_city() {
    let mut directory = directory();

    directory.sync("Toulouse", sync_data(&[1, 2, 3], "Toulouse")).unwrap();
    directory.sync("Montpellier", sync_data(&[10, 11], "Montpellier")).unwrap();
    directory.sync("Toulouse", sync_data(&[4], "Toulouse")).unwrap();

    let snapshot = directory.snapshot();
    let toulouse: Vec<u64> = snapshot.slice("Toulouse").unwrap().animals.iter().map(|a| a.id).collect();
    let montpellier: Vec<u64> = snapshot
        .slice("Montpellier")
        .unwrap()
        .animals
        .iter()
        .map(|a| a.id)
        .collect();

    assert_eq!(toulouse, vec![4]);
    assert_eq!(montpellier, vec![10, 11]);
    assert_eq!(directory.stats().total_animals, 3);
    assert_eq!(directory.stats().total_matches, 2);
}

#[test]
fn test_sync_with_empty_payload_clears_slice() {
    let mut directory = directory();
    directory.sync("Toulouse", sync_data(&[1, 2], "Toulouse")).unwrap();
    directory.sync("Toulouse", Default::default()).unwrap();

    assert_eq!(directory.stats().total_animals, 0);
    assert_eq!(directory.snapshot().flatten().matches.len(), 0);
}

#[test]
fn test_update_city_changes_aggregated_copy_until_next_sync() {
    let mut directory = directory();
    directory.sync("Toulouse", sync_data(&[7], "Toulouse")).unwrap();

    let moved = directory.update_city(7, "Montpellier").unwrap();
    assert_eq!(moved.city, "Montpellier");
    assert_eq!(directory.snapshot().animal(7).unwrap().city, "Montpellier");

    // The region never relocated it, so its next push restores the old city
    directory.sync("Toulouse", sync_data(&[7], "Toulouse")).unwrap();
    assert_eq!(directory.snapshot().animal(7).unwrap().city, "Toulouse");
}

#[test]
fn test_corrupt_snapshot_resets_to_empty() {
    let backend = Arc::new(MemoryBackend::new());
    backend.write(Collection::Aggregated, b"{not json").unwrap();
    backend.write(Collection::Registry, b"[]").unwrap();

    let directory = Directory::load(backend.clone());
    assert_eq!(directory.stats().total_animals, 0);
    assert_eq!(backend.raw(Collection::Aggregated).unwrap(), b"{}".to_vec());
}

// ============================================================================
// Routing
// ============================================================================

const CITIES: [(&str, f64, f64); 3] = [
    ("Toulouse", 43.6047, 1.4442),
    ("Montpellier", 43.6108, 3.8767),
    ("Paris", 48.8566, 2.3522),
];

fn three_city_directory() -> Directory {
    let mut directory = directory();
    for (name, lat, lon) in CITIES {
        directory.register(register_request(name, lat, lon)).unwrap();
    }
    directory
}

#[test]
fn test_nearest_routes_to_registered_url() {
    let directory = three_city_directory();

    let nearest = directory.find_nearest(48.0, 2.0).unwrap();
    assert_eq!(nearest.city, "Paris");
    assert_eq!(nearest.redirect_url, "http://paris.test");
}

#[test]
fn test_nearest_on_empty_registry_is_not_found() {
    let err = directory().find_nearest(43.0, 1.0).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

proptest! {
    #[test]
    fn prop_nearest_matches_brute_force(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
        let directory = three_city_directory();
        let nearest = directory.find_nearest(lat, lon).unwrap();

        let mut best = (CITIES[0].0, f64::INFINITY);
        for (name, clat, clon) in CITIES {
            let d = haversine_km(lat, lon, clat, clon);
            if d < best.1 {
                best = (name, d);
            }
        }

        prop_assert_eq!(nearest.city.as_str(), best.0);
        prop_assert!((nearest.distance_km - best.1).abs() < 1e-9);
    }
}
