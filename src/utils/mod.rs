//! Common utilities and helper functions

use chrono::Utc;
use url::Url;

use crate::error::{Error, Result};
use crate::models::RecordId;

/// Time-based id source.
///
/// Ids are the current Unix time in milliseconds, bumped past the last issued
/// id when two requests land in the same millisecond, so they are strictly
/// increasing within one process.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last: RecordId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that never issues an id at or below `last`
    pub fn starting_after(last: RecordId) -> Self {
        Self { last }
    }

    pub fn next_id(&mut self) -> RecordId {
        let now = Utc::now().timestamp_millis().max(0) as RecordId;
        let id = now.max(self.last.saturating_add(1));
        self.last = id;
        id
    }

    pub fn last(&self) -> RecordId {
        self.last
    }
}

/// Reject latitudes outside [-90, 90] and longitudes outside [-180, 180]
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::validation(format!(
            "latitude must be within [-90, 90], got {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::validation(format!(
            "longitude must be within [-180, 180], got {longitude}"
        )));
    }
    Ok(())
}

/// Parse an http(s) base URL and strip any trailing slash
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| Error::validation(format!("invalid url '{raw}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(Error::validation(format!(
            "url must be an http(s) address with a host, got '{raw}'"
        )));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut ids = IdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        let third = ids.next_id();

        assert!(first < second && second < third);
    }

    #[test]
    fn test_ids_skip_past_existing() {
        let far_future = 9_000_000_000_000;
        let mut ids = IdGenerator::starting_after(far_future);
        assert_eq!(ids.next_id(), far_future + 1);
        assert_eq!(ids.last(), far_future + 1);
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(43.6, 1.44).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:3001/").unwrap(),
            "http://localhost:3001"
        );
        assert_eq!(
            normalize_base_url(" https://toulouse.example.org ").unwrap(),
            "https://toulouse.example.org"
        );
        assert!(normalize_base_url("localhost:3001").is_err());
        assert!(normalize_base_url("ftp://files.example.org").is_err());
    }
}
