//! Aggregated read-only copy of every region's public data
//!
//! The snapshot is a map from city name to the slice that city last pushed.
//! A sync swaps the whole slice, so a city can never have two slices and a
//! partial push drops whatever it no longer contains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Animal, LikeMap, Match, RecordId, SyncData};

/// Body of `POST /sync`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRequest {
    pub city: String,
    pub data: SyncData,
}

/// Body of `POST /updateCity` (and of the region's relocation notice)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelocationRequest {
    pub id: RecordId,
    pub new_city: String,
}

/// What one city last pushed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitySlice {
    #[serde(default)]
    pub animals: Vec<Animal>,

    #[serde(default)]
    pub matches: Vec<Match>,

    #[serde(default)]
    pub likes: LikeMap,

    #[serde(default = "Utc::now")]
    pub synced_at: DateTime<Utc>,
}

impl From<SyncData> for CitySlice {
    fn from(data: SyncData) -> Self {
        Self {
            animals: data.animals,
            matches: data.matches,
            likes: data.likes,
            synced_at: Utc::now(),
        }
    }
}

/// Flat view served by `GET /aggregated`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlatSnapshot {
    pub animals: Vec<Animal>,
    pub matches: Vec<Match>,
    pub likes: LikeMap,
}

/// Per-city slices, last write wins per city
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AggregatedSnapshot {
    slices: BTreeMap<String, CitySlice>,
}

impl AggregatedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slice for `city`, returning the one it displaced
    pub fn replace_slice(&mut self, city: &str, data: SyncData) -> Option<CitySlice> {
        self.slices.insert(city.to_string(), CitySlice::from(data))
    }

    pub fn slice(&self, city: &str) -> Option<&CitySlice> {
        self.slices.get(city)
    }

    pub fn slices(&self) -> impl Iterator<Item = (&str, &CitySlice)> {
        self.slices.iter().map(|(city, slice)| (city.as_str(), slice))
    }

    pub fn animals(&self) -> impl Iterator<Item = &Animal> {
        self.slices.values().flat_map(|s| s.animals.iter())
    }

    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.slices.values().flat_map(|s| s.matches.iter())
    }

    pub fn animal(&self, id: RecordId) -> Option<&Animal> {
        self.animals().find(|a| a.id == id)
    }

    pub fn total_animals(&self) -> usize {
        self.slices.values().map(|s| s.animals.len()).sum()
    }

    pub fn total_matches(&self) -> usize {
        self.slices.values().map(|s| s.matches.len()).sum()
    }

    /// Change the city field of the aggregated copy of an animal.
    ///
    /// The animal stays in the slice of the city that pushed it; the next
    /// push from that city overwrites this edit.
    pub fn update_city(&mut self, id: RecordId, new_city: &str) -> Option<&Animal> {
        let animal = self
            .slices
            .values_mut()
            .flat_map(|s| s.animals.iter_mut())
            .find(|a| a.id == id)?;
        animal.city = new_city.to_string();
        Some(animal)
    }

    /// All slices concatenated in city order
    pub fn flatten(&self) -> FlatSnapshot {
        let mut likes = LikeMap::new();
        for slice in self.slices.values() {
            for (actor, edges) in &slice.likes {
                let merged = likes.entry(*actor).or_default();
                for target in &edges.liked {
                    merged.add_liked(*target);
                }
                for target in &edges.unliked {
                    merged.add_unliked(*target);
                }
            }
        }

        FlatSnapshot {
            animals: self.animals().cloned().collect(),
            matches: self.matches().cloned().collect(),
            likes,
        }
    }
}
