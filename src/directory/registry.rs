//! City registry kept by the master
//!
//! Registration is an upsert keyed by city name. The registry keeps first
//! registration order, which is also the tie-break order of the router.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::City;
use crate::utils::{normalize_base_url, validate_coordinates};

/// Registration request sent by a region at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCityRequest {
    pub city: String,
    pub url: String,
    pub animal_count: u64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Whether a registration added a city or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Updated,
}

/// Ordered list of known cities
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CityRegistry {
    cities: Vec<City>,
}

impl CityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `request.city`.
    ///
    /// An existing entry keeps its position and has every field replaced.
    pub fn register(&mut self, request: RegisterCityRequest) -> Result<RegisterOutcome> {
        let name = request.city.trim();
        if name.is_empty() {
            return Err(Error::validation("city is required"));
        }
        validate_coordinates(request.latitude, request.longitude)?;
        let url = normalize_base_url(&request.url)?;

        let city = City {
            name: name.to_string(),
            url,
            animal_count: request.animal_count,
            latitude: request.latitude,
            longitude: request.longitude,
            registered_at: Utc::now(),
        };

        match self.cities.iter_mut().find(|c| c.name == city.name) {
            Some(existing) => {
                *existing = city;
                Ok(RegisterOutcome::Updated)
            }
            None => {
                self.cities.push(city);
                Ok(RegisterOutcome::Created)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Cities in registration order
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(city: &str, url: &str) -> RegisterCityRequest {
        RegisterCityRequest {
            city: city.to_string(),
            url: url.to_string(),
            animal_count: 3,
            latitude: 43.6,
            longitude: 1.44,
        }
    }

    #[test]
    fn test_register_appends_new_city() {
        let mut registry = CityRegistry::new();

        let outcome = registry.register(request("Toulouse", "http://localhost:3001")).unwrap();
        assert_eq!(outcome, RegisterOutcome::Created);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Toulouse").unwrap().url, "http://localhost:3001");
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = CityRegistry::new();
        registry.register(request("Toulouse", "http://localhost:3001")).unwrap();
        registry.register(request("Montpellier", "http://localhost:3002")).unwrap();

        let mut update = request("Toulouse", "http://toulouse.example.org/");
        update.animal_count = 12;
        let outcome = registry.register(update).unwrap();

        assert_eq!(outcome, RegisterOutcome::Updated);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.cities()[0].name, "Toulouse");
        assert_eq!(registry.cities()[0].url, "http://toulouse.example.org");
        assert_eq!(registry.cities()[0].animal_count, 12);
    }

    #[test]
    fn test_register_validates_input() {
        let mut registry = CityRegistry::new();

        assert!(registry.register(request("  ", "http://localhost:3001")).is_err());
        assert!(registry.register(request("Toulouse", "not-a-url")).is_err());

        let mut bad = request("Toulouse", "http://localhost:3001");
        bad.latitude = 95.0;
        assert!(registry.register(bad).is_err());

        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_serializes_as_list() {
        let mut registry = CityRegistry::new();
        registry.register(request("Toulouse", "http://localhost:3001")).unwrap();

        let value = serde_json::to_value(&registry).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["city"], "Toulouse");
        assert_eq!(value[0]["animalCount"], 3);
    }
}
