//! Common test utilities

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use pawmatch::config::RegionConfig;
use pawmatch::directory::RegisterCityRequest;
use pawmatch::models::{Animal, Attributes, Match, RecordId, SyncData};
use pawmatch::region::{ClientConfig, RegionServer, UpstreamClient};
use pawmatch::storage::MemoryBackend;

/// Serve `router` on an ephemeral local port and return its base URL
#[allow(dead_code)]
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Region configuration pointing at `master_url`
#[allow(dead_code)]
pub fn region_config(city: &str, lat: f64, lon: f64, master_url: &str) -> RegionConfig {
    RegionConfig::builder()
        .city(city)
        .coordinates(lat, lon)
        .public_url(format!("http://{}.test", city.to_lowercase()))
        .master_url(master_url)
        .enable_request_logging(false)
        .build()
        .unwrap()
}

/// In-memory region server whose upstream calls give up after `timeout`
#[allow(dead_code)]
pub fn memory_region(config: RegionConfig, timeout: Duration) -> (RegionServer, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let client = UpstreamClient::new(
        ClientConfig::new(config.master_base_url()).with_timeout(timeout),
    )
    .unwrap();
    let server = RegionServer::with_client(config, backend.clone(), client);
    (server, backend)
}

#[allow(dead_code)]
pub fn register_request(city: &str, lat: f64, lon: f64) -> RegisterCityRequest {
    RegisterCityRequest {
        city: city.to_string(),
        url: format!("http://{}.test", city.to_lowercase()),
        animal_count: 0,
        latitude: lat,
        longitude: lon,
    }
}

#[allow(dead_code)]
pub fn animal(id: RecordId, city: &str) -> Animal {
    let mut attributes = Attributes::new();
    attributes.insert("name".to_string(), format!("animal-{id}").into());
    Animal::new(id, None, city, attributes)
}

/// Sync payload with one animal per id and a single match
#[allow(dead_code)]
pub fn sync_data(ids: &[RecordId], city: &str) -> SyncData {
    SyncData {
        animals: ids.iter().map(|id| animal(*id, city)).collect(),
        matches: vec![Match {
            id: 1,
            animals: [ids[0], ids[ids.len() - 1]],
            city: city.to_string(),
        }],
        likes: Default::default(),
    }
}
