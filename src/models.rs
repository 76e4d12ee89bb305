//! Core data structures shared by the master and the regional servers
//!
//! Field names follow the JSON wire format (`camelCase`). Animals and users
//! carry free-form attributes flattened next to their fixed fields, so a
//! body like `{"id": 1, "city": "Toulouse", "name": "Rex"}` round-trips
//! through [`Animal`] unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Identifier for users, animals and matches (time-based, milliseconds)
pub type RecordId = u64;

/// Free-form JSON attributes
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Like edges per actor
pub type LikeMap = BTreeMap<RecordId, LikeEdges>;

// ============================================================================
// City
// ============================================================================

/// A regional server as known by the master directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// City name, unique key of the registry
    #[serde(rename = "city")]
    pub name: String,

    /// Base URL of the regional server
    pub url: String,

    /// Number of animals the region reported at registration
    pub animal_count: u64,

    pub latitude: f64,
    pub longitude: f64,

    /// Time of the latest registration
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

// ============================================================================
// Animal
// ============================================================================

/// An animal listed for adoption
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Animal {
    pub id: RecordId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<RecordId>,

    /// City the animal currently lives in
    pub city: String,

    /// Name, photo, species and anything else the client sends
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Animal {
    /// Create an animal with the given id, owner and city.
    ///
    /// `id`, `city` and `ownerId` keys in `attributes` are dropped; the fixed
    /// fields always win.
    pub fn new(id: RecordId, owner_id: Option<RecordId>, city: &str, mut attributes: Attributes) -> Self {
        for key in ["id", "city", "ownerId"] {
            attributes.remove(key);
        }
        Self {
            id,
            owner_id,
            city: city.to_string(),
            attributes,
        }
    }

    /// Shallow-merge a patch into this animal.
    ///
    /// `id` and `city` are not patchable; the city only changes through
    /// relocation.
    pub fn apply_patch(&mut self, patch: Attributes) -> Result<()> {
        for (key, value) in patch {
            match key.as_str() {
                "id" | "city" => continue,
                "ownerId" => {
                    self.owner_id = match value {
                        serde_json::Value::Null => None,
                        other => Some(serde_json::from_value(other).map_err(|_| {
                            Error::validation("ownerId must be a numeric id or null")
                        })?),
                    };
                }
                _ => {
                    self.attributes.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// User
// ============================================================================

/// A regional user owning animals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub username: String,

    #[serde(default)]
    pub animal_ids: Vec<RecordId>,

    #[serde(flatten)]
    pub profile: Attributes,
}

impl User {
    /// Shallow-merge a profile patch. `id` and `animalIds` are not patchable.
    pub fn apply_patch(&mut self, patch: Attributes) -> Result<()> {
        for (key, value) in patch {
            match key.as_str() {
                "id" | "animalIds" => continue,
                "username" => {
                    let username = value
                        .as_str()
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| Error::validation("username must be a non-empty string"))?;
                    self.username = username.to_string();
                }
                _ => {
                    self.profile.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Likes & Matches
// ============================================================================

/// Directional interest of one actor.
///
/// `liked` and `unliked` are independent logs: unliking never removes an
/// entry from `liked`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeEdges {
    #[serde(default)]
    pub liked: Vec<RecordId>,

    #[serde(default)]
    pub unliked: Vec<RecordId>,
}

impl LikeEdges {
    pub fn likes(&self, target: RecordId) -> bool {
        self.liked.contains(&target)
    }

    /// Add to `liked`; returns false if it was already there
    pub fn add_liked(&mut self, target: RecordId) -> bool {
        if self.liked.contains(&target) {
            return false;
        }
        self.liked.push(target);
        true
    }

    /// Add to `unliked`; returns false if it was already there
    pub fn add_unliked(&mut self, target: RecordId) -> bool {
        if self.unliked.contains(&target) {
            return false;
        }
        self.unliked.push(target);
        true
    }
}

/// Mutual like between two parties
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Match {
    pub id: RecordId,

    /// `[actor, target]` in the order the closing like was made
    pub animals: [RecordId; 2],

    pub city: String,
}

// ============================================================================
// Sync payload
// ============================================================================

/// Public data a region pushes to the master
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncData {
    #[serde(default)]
    pub animals: Vec<Animal>,

    #[serde(default)]
    pub matches: Vec<Match>,

    #[serde(default)]
    pub likes: LikeMap,
}
