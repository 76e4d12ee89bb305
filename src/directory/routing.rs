//! Nearest-server routing
//!
//! Great-circle distance on a sphere of radius 6371 km. The first registered
//! city wins a distance tie.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::City;
use crate::utils::validate_coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two (lat, lon) points in degrees
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Client location for `/nearest`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NearestQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// Routing answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nearest {
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    pub city: String,
    pub distance_km: f64,
}

/// Pick the city closest to `(latitude, longitude)`
pub fn find_nearest(cities: &[City], latitude: f64, longitude: f64) -> Result<Nearest> {
    validate_coordinates(latitude, longitude)?;

    let mut best: Option<(&City, f64)> = None;
    for city in cities {
        let distance = haversine_km(latitude, longitude, city.latitude, city.longitude);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((city, distance)),
        }
    }

    let (city, distance_km) = best.ok_or_else(|| Error::not_found("server", "any"))?;
    Ok(Nearest {
        redirect_url: city.url.clone(),
        city: city.name.clone(),
        distance_km,
    })
}
