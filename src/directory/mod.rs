//! Master directory
//!
//! Owns the city registry and the aggregated snapshot, persists both through
//! a [`Backend`], and answers routing and statistics queries.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐ register/sync ┌───────────────────────────┐
//! │ Region A │──────────────▶│        Directory          │
//! └──────────┘               │  CityRegistry (ordered)   │
//! ┌──────────┐ register/sync │  AggregatedSnapshot       │
//! │ Region B │──────────────▶│  city -> CitySlice        │
//! └──────────┘               └─────────────┬─────────────┘
//!                                          │ find_nearest
//!                                    ┌─────▼─────┐
//!                                    │  Client   │
//!                                    └───────────┘
//! ```

pub mod aggregate;
pub mod api;
pub mod registry;
pub mod routing;
pub mod server;

pub use aggregate::{AggregatedSnapshot, CitySlice, FlatSnapshot, RelocationRequest, SyncRequest};
pub use registry::{CityRegistry, RegisterCityRequest, RegisterOutcome};
pub use routing::{find_nearest, haversine_km, Nearest, NearestQuery};
pub use server::{DirectoryServer, DirectoryState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Animal, City, RecordId, SyncData};
use crate::storage::{self, Backend, Collection};

/// Entry of `stats().servers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub city: String,
    pub animal_count: u64,
}

/// Entry of `stats().slices`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SliceSummary {
    pub city: String,
    pub animals: usize,
    pub matches: usize,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    pub total_animals: usize,
    pub total_matches: usize,
    pub server_count: usize,
    pub servers: Vec<ServerSummary>,
    pub slices: Vec<SliceSummary>,
}

/// Registry plus snapshot, persisted after every mutation
pub struct Directory {
    backend: Arc<dyn Backend>,
    registry: CityRegistry,
    snapshot: AggregatedSnapshot,
}

impl Directory {
    /// Restore state from `backend`, resetting missing or corrupt records
    pub fn load(backend: Arc<dyn Backend>) -> Self {
        let registry: CityRegistry = storage::load_or_default(backend.as_ref(), Collection::Registry);
        let snapshot: AggregatedSnapshot =
            storage::load_or_default(backend.as_ref(), Collection::Aggregated);

        tracing::info!(
            cities = registry.len(),
            animals = snapshot.total_animals(),
            "Directory state loaded"
        );

        Self {
            backend,
            registry,
            snapshot,
        }
    }

    pub fn register(&mut self, request: RegisterCityRequest) -> Result<RegisterOutcome> {
        let city = request.city.trim().to_string();
        let outcome = self.registry.register(request)?;
        storage::save(self.backend.as_ref(), Collection::Registry, &self.registry)?;

        tracing::info!(city = %city, outcome = ?outcome, "City registered");
        crate::metrics::record_registration(&city, self.registry.len());
        Ok(outcome)
    }

    /// Replace the slice pushed by `city`
    pub fn sync(&mut self, city: &str, data: SyncData) -> Result<()> {
        let city = city.trim();
        if city.is_empty() {
            return Err(Error::validation("city is required"));
        }
        if !self.registry.contains(city) {
            tracing::warn!(city = %city, "Sync received from unregistered city");
        }

        let animals = data.animals.len();
        let matches = data.matches.len();
        self.snapshot.replace_slice(city, data);
        storage::save(self.backend.as_ref(), Collection::Aggregated, &self.snapshot)?;

        tracing::debug!(city = %city, animals, matches, "Slice replaced");
        crate::metrics::record_sync_received(city);
        Ok(())
    }

    /// Change the city of the aggregated copy of an animal
    pub fn update_city(&mut self, id: RecordId, new_city: &str) -> Result<Animal> {
        if new_city.trim().is_empty() {
            return Err(Error::validation("newCity is required"));
        }

        let updated = self.snapshot.update_city(id, new_city.trim()).cloned();
        crate::metrics::record_relocation(updated.is_some());
        let animal = updated.ok_or_else(|| Error::not_found("animal", id))?;

        storage::save(self.backend.as_ref(), Collection::Aggregated, &self.snapshot)?;
        tracing::info!(animal_id = id, new_city = %animal.city, "Aggregated animal relocated");
        Ok(animal)
    }

    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            total_animals: self.snapshot.total_animals(),
            total_matches: self.snapshot.total_matches(),
            server_count: self.registry.len(),
            servers: self
                .registry
                .cities()
                .iter()
                .map(|c| ServerSummary {
                    city: c.name.clone(),
                    animal_count: c.animal_count,
                })
                .collect(),
            slices: self
                .snapshot
                .slices()
                .map(|(city, slice)| SliceSummary {
                    city: city.to_string(),
                    animals: slice.animals.len(),
                    matches: slice.matches.len(),
                    synced_at: slice.synced_at,
                })
                .collect(),
        }
    }

    pub fn find_nearest(&self, latitude: f64, longitude: f64) -> Result<Nearest> {
        let nearest = routing::find_nearest(self.registry.cities(), latitude, longitude)?;
        crate::metrics::record_nearest_lookup(&nearest.city);
        Ok(nearest)
    }

    pub fn cities(&self) -> &[City] {
        self.registry.cities()
    }

    pub fn registry(&self) -> &CityRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> &AggregatedSnapshot {
        &self.snapshot
    }
}
