//! Prometheus metrics for the master directory and regional servers
//!
//! - Master: registrations, sync pushes received, relocation notices,
//!   nearest-server lookups, registry size
//! - Region: sync pushes by outcome, likes, matches created
//!
//! Call [`init_metrics`] at startup. Until it succeeds every recording
//! function is a no-op.

use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct DirectoryMetrics {
    registrations: CounterVec,
    syncs_received: CounterVec,
    relocations: CounterVec,
    nearest_lookups: CounterVec,
    registered_cities: Gauge,
}

struct RegionMetrics {
    sync_pushes: CounterVec,
    likes: CounterVec,
    matches_created: CounterVec,
}

static DIRECTORY_METRICS: OnceLock<DirectoryMetrics> = OnceLock::new();
static REGION_METRICS: OnceLock<RegionMetrics> = OnceLock::new();
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default Prometheus registry.
///
/// Idempotent: later calls return the first outcome without registering again.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    METRICS_INIT
        .get_or_init(|| register_all().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_all() -> Result<(), Box<dyn std::error::Error>> {
    let directory = DirectoryMetrics {
        registrations: register_counter_vec!(
            "pawmatch_directory_registrations_total",
            "City registrations received by the master",
            &["city"]
        )?,
        syncs_received: register_counter_vec!(
            "pawmatch_directory_syncs_received_total",
            "Sync pushes applied by the master",
            &["city"]
        )?,
        relocations: register_counter_vec!(
            "pawmatch_directory_relocations_total",
            "Relocation notices by outcome",
            &["outcome"]
        )?,
        nearest_lookups: register_counter_vec!(
            "pawmatch_directory_nearest_lookups_total",
            "Nearest-server lookups by resolved city",
            &["city"]
        )?,
        registered_cities: register_gauge!(
            "pawmatch_directory_registered_cities",
            "Number of cities in the registry"
        )?,
    };

    let region = RegionMetrics {
        sync_pushes: register_counter_vec!(
            "pawmatch_region_sync_pushes_total",
            "Sync pushes to the master by outcome",
            &["city", "outcome"]
        )?,
        likes: register_counter_vec!(
            "pawmatch_region_likes_total",
            "Like and unlike operations",
            &["city", "kind"]
        )?,
        matches_created: register_counter_vec!(
            "pawmatch_region_matches_created_total",
            "Matches created by reciprocal likes",
            &["city"]
        )?,
    };

    DIRECTORY_METRICS
        .set(directory)
        .map_err(|_| "Directory metrics already initialized")?;
    REGION_METRICS
        .set(region)
        .map_err(|_| "Region metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

pub fn metrics_initialized() -> bool {
    DIRECTORY_METRICS.get().is_some() && REGION_METRICS.get().is_some()
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// ============================================================================
// Directory
// ============================================================================

pub fn record_registration(city: &str, registry_size: usize) {
    if let Some(m) = DIRECTORY_METRICS.get() {
        m.registrations.with_label_values(&[city]).inc();
        m.registered_cities.set(registry_size as f64);
    }
}

pub fn record_sync_received(city: &str) {
    if let Some(m) = DIRECTORY_METRICS.get() {
        m.syncs_received.with_label_values(&[city]).inc();
    }
}

pub fn record_relocation(found: bool) {
    if let Some(m) = DIRECTORY_METRICS.get() {
        let outcome = if found { "applied" } else { "not_found" };
        m.relocations.with_label_values(&[outcome]).inc();
    }
}

pub fn record_nearest_lookup(city: &str) {
    if let Some(m) = DIRECTORY_METRICS.get() {
        m.nearest_lookups.with_label_values(&[city]).inc();
    }
}

// ============================================================================
// Region
// ============================================================================

pub fn record_sync_push(city: &str, success: bool) {
    if let Some(m) = REGION_METRICS.get() {
        let outcome = if success { "success" } else { "failure" };
        m.sync_pushes.with_label_values(&[city, outcome]).inc();
    }
}

pub fn record_like(city: &str, kind: &str) {
    if let Some(m) = REGION_METRICS.get() {
        m.likes.with_label_values(&[city, kind]).inc();
    }
}

pub fn record_match_created(city: &str) {
    if let Some(m) = REGION_METRICS.get() {
        m.matches_created.with_label_values(&[city]).inc();
    }
}
