//! In-memory state of one regional server
//!
//! Every mutation updates the in-memory collections first and then writes
//! the touched collections through the [`Backend`]. A failed write is
//! returned to the caller but the in-memory change is kept.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{Animal, Attributes, LikeEdges, Match, RecordId, SyncData, User};
use crate::storage::{self, Backend, Collection};
use crate::utils::IdGenerator;

use super::likes::{LikeBook, LikeOutcome};

/// User with their like edges, as returned by `GET /users/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub likes: LikeEdges,
}

/// Everything a region hands over when a user moves to another city
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferBundle {
    pub user: User,

    #[serde(default)]
    pub animals: Vec<Animal>,

    #[serde(default)]
    pub likes: LikeEdges,
}

pub struct RegionalStore {
    city: String,
    backend: Arc<dyn Backend>,
    users: Vec<User>,
    animals: Vec<Animal>,
    matches: Vec<Match>,
    likes: LikeBook,
    ids: IdGenerator,
    /// Users whose hand-over to another region is in flight
    transferring: HashSet<RecordId>,
}

impl RegionalStore {
    /// Restore every collection, resetting any that is missing or corrupt
    pub fn load(city: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        let city = city.into();
        let users: Vec<User> = storage::load_or_default(backend.as_ref(), Collection::Users);
        let animals: Vec<Animal> = storage::load_or_default(backend.as_ref(), Collection::Animals);
        let matches: Vec<Match> = storage::load_or_default(backend.as_ref(), Collection::Matches);
        let likes: LikeBook = storage::load_or_default(backend.as_ref(), Collection::Likes);

        let last_id = users
            .iter()
            .map(|u| u.id)
            .chain(animals.iter().map(|a| a.id))
            .chain(matches.iter().map(|m| m.id))
            .max()
            .unwrap_or(0);

        tracing::info!(
            city = %city,
            users = users.len(),
            animals = animals.len(),
            matches = matches.len(),
            actors = likes.len(),
            "Regional state loaded"
        );

        Self {
            city,
            backend,
            users,
            animals,
            matches,
            likes,
            ids: IdGenerator::starting_after(last_id),
            transferring: HashSet::new(),
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn persist(&self, collection: Collection) -> Result<()> {
        let backend = self.backend.as_ref();
        match collection {
            Collection::Users => storage::save(backend, collection, &self.users),
            Collection::Animals => storage::save(backend, collection, &self.animals),
            Collection::Matches => storage::save(backend, collection, &self.matches),
            Collection::Likes => storage::save(backend, collection, &self.likes),
            Collection::Registry | Collection::Aggregated => Err(Error::other(format!(
                "{collection} is not a regional collection"
            ))),
        }
    }

    fn persist_all(&self, collections: &[Collection]) -> Result<()> {
        collections.iter().try_for_each(|c| self.persist(*c))
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub fn register_user(&mut self, username: &str, profile: Attributes) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::validation("username is required"));
        }

        let mut profile = profile;
        for key in ["id", "username", "animalIds"] {
            profile.remove(key);
        }

        let user = User {
            id: self.ids.next_id(),
            username: username.to_string(),
            animal_ids: Vec::new(),
            profile,
        };
        self.users.push(user.clone());
        self.persist(Collection::Users)?;

        tracing::info!(city = %self.city, user_id = user.id, "User registered");
        Ok(user)
    }

    pub fn user(&self, id: RecordId) -> Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::not_found("user", id))
    }

    pub fn profile(&self, id: RecordId) -> Result<UserProfile> {
        let user = self.user(id)?.clone();
        Ok(UserProfile {
            user,
            likes: self.likes.edges(id),
        })
    }

    pub fn update_user(&mut self, id: RecordId, patch: Attributes) -> Result<User> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::not_found("user", id))?;
        user.apply_patch(patch)?;
        let updated = user.clone();
        self.persist(Collection::Users)?;
        Ok(updated)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    // ------------------------------------------------------------------------
    // Animals
    // ------------------------------------------------------------------------

    /// Create an animal in this region's city, optionally owned by a local user
    pub fn create_animal(&mut self, attributes: Attributes, owner_id: Option<RecordId>) -> Result<Animal> {
        if let Some(owner) = owner_id {
            self.user(owner)?;
        }

        let animal = Animal::new(self.ids.next_id(), owner_id, &self.city, attributes);
        self.animals.push(animal.clone());

        if let Some(owner) = owner_id {
            if let Some(user) = self.users.iter_mut().find(|u| u.id == owner) {
                user.animal_ids.push(animal.id);
            }
            self.persist_all(&[Collection::Animals, Collection::Users])?;
        } else {
            self.persist(Collection::Animals)?;
        }

        tracing::info!(city = %self.city, animal_id = animal.id, owner_id = ?owner_id, "Animal created");
        Ok(animal)
    }

    pub fn animal(&self, id: RecordId) -> Result<&Animal> {
        self.animals
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("animal", id))
    }

    pub fn update_animal(&mut self, id: RecordId, patch: Attributes) -> Result<Animal> {
        let animal = self
            .animals
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("animal", id))?;
        animal.apply_patch(patch)?;
        let updated = animal.clone();
        self.persist(Collection::Animals)?;
        Ok(updated)
    }

    /// Move an animal to another city in the local copy only
    pub fn relocate(&mut self, id: RecordId, new_city: &str) -> Result<Animal> {
        let new_city = new_city.trim();
        if new_city.is_empty() {
            return Err(Error::validation("newCity is required"));
        }

        let animal = self
            .animals
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("animal", id))?;
        let previous = std::mem::replace(&mut animal.city, new_city.to_string());
        let updated = animal.clone();
        self.persist(Collection::Animals)?;

        tracing::info!(animal_id = id, from = %previous, to = %new_city, "Animal relocated");
        Ok(updated)
    }

    pub fn animals(&self) -> &[Animal] {
        &self.animals
    }

    /// Animals currently located in this region's city
    pub fn city_animals(&self) -> Vec<Animal> {
        self.animals
            .iter()
            .filter(|a| a.city == self.city)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Likes & Matches
    // ------------------------------------------------------------------------

    /// Record that `actor` likes `target`, creating a match when the like is
    /// reciprocated.
    ///
    /// Matches are not deduplicated: every reciprocated like creates one.
    pub fn like(&mut self, actor: RecordId, target: RecordId) -> Result<LikeOutcome> {
        if actor == target {
            return Err(Error::validation("an actor cannot like itself"));
        }

        let record = self.likes.record_like(actor, target);
        crate::metrics::record_like(&self.city, "like");

        if !record.reciprocal {
            self.persist(Collection::Likes)?;
            return Ok(LikeOutcome::no_match());
        }

        let new_match = Match {
            id: self.ids.next_id(),
            animals: [actor, target],
            city: self.city.clone(),
        };
        self.matches.push(new_match.clone());
        self.persist_all(&[Collection::Likes, Collection::Matches])?;

        tracing::info!(city = %self.city, match_id = new_match.id, actor, target, "Match created");
        crate::metrics::record_match_created(&self.city);
        Ok(LikeOutcome::matched(new_match))
    }

    pub fn unlike(&mut self, actor: RecordId, target: RecordId) -> Result<()> {
        self.likes.record_unlike(actor, target);
        crate::metrics::record_like(&self.city, "unlike");
        self.persist(Collection::Likes)
    }

    pub fn edges(&self, actor: RecordId) -> LikeEdges {
        self.likes.edges(actor)
    }

    /// Record a match explicitly
    pub fn add_match(&mut self, animals: [RecordId; 2]) -> Result<Match> {
        if animals[0] == animals[1] {
            return Err(Error::validation("a match needs two distinct parties"));
        }

        let new_match = Match {
            id: self.ids.next_id(),
            animals,
            city: self.city.clone(),
        };
        self.matches.push(new_match.clone());
        self.persist(Collection::Matches)?;
        Ok(new_match)
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn city_matches(&self) -> Vec<Match> {
        self.matches
            .iter()
            .filter(|m| m.city == self.city)
            .cloned()
            .collect()
    }

    /// Public data pushed to the master
    pub fn sync_data(&self) -> SyncData {
        SyncData {
            animals: self.animals.clone(),
            matches: self.matches.clone(),
            likes: self.likes.as_map().clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------------

    fn owned_by(user: &User, animal: &Animal) -> bool {
        animal.owner_id == Some(user.id) || user.animal_ids.contains(&animal.id)
    }

    /// Collect a user, the animals they own and their like edges
    pub fn export_user(&self, id: RecordId) -> Result<TransferBundle> {
        let user = self.user(id)?.clone();
        let animals = self
            .animals
            .iter()
            .filter(|a| Self::owned_by(&user, a))
            .cloned()
            .collect();

        Ok(TransferBundle {
            likes: self.likes.edges(id),
            user,
            animals,
        })
    }

    /// Export a user and mark them as leaving.
    ///
    /// Only one hand-over per user can be in flight; a second call before
    /// [`finish_transfer`](Self::finish_transfer) or
    /// [`abort_transfer`](Self::abort_transfer) is a conflict.
    pub fn begin_transfer(&mut self, id: RecordId) -> Result<TransferBundle> {
        if self.transferring.contains(&id) {
            return Err(Error::conflict(format!("user {id} is already being transferred")));
        }
        let bundle = self.export_user(id)?;
        self.transferring.insert(id);
        Ok(bundle)
    }

    /// The peer accepted the user: forget them locally
    pub fn finish_transfer(&mut self, id: RecordId) -> Result<()> {
        self.transferring.remove(&id);
        self.remove_user(id)
    }

    /// The hand-over failed: the user stays here
    pub fn abort_transfer(&mut self, id: RecordId) {
        self.transferring.remove(&id);
    }

    pub fn is_transferring(&self, id: RecordId) -> bool {
        self.transferring.contains(&id)
    }

    /// Drop a user, the animals they own and their like edges
    pub fn remove_user(&mut self, id: RecordId) -> Result<()> {
        let position = self
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| Error::not_found("user", id))?;
        let user = self.users.remove(position);

        let before = self.animals.len();
        self.animals.retain(|a| !Self::owned_by(&user, a));
        let removed_animals = before - self.animals.len();
        self.likes.remove(id);

        self.persist_all(&[Collection::Users, Collection::Animals, Collection::Likes])?;
        tracing::info!(city = %self.city, user_id = id, removed_animals, "User removed");
        Ok(())
    }

    /// Adopt a user handed over by another region, keeping every id
    pub fn import_user(&mut self, bundle: TransferBundle) -> Result<User> {
        let TransferBundle {
            user,
            animals,
            likes,
        } = bundle;

        if self.users.iter().any(|u| u.id == user.id) {
            return Err(Error::validation(format!("user {} already exists", user.id)));
        }
        let existing: HashSet<RecordId> = self.animals.iter().map(|a| a.id).collect();
        if let Some(clash) = animals.iter().find(|a| existing.contains(&a.id)) {
            return Err(Error::validation(format!("animal {} already exists", clash.id)));
        }

        let max_id = animals.iter().map(|a| a.id).chain([user.id]).max().unwrap_or(0);
        self.ids = IdGenerator::starting_after(self.ids.last().max(max_id));

        let imported = animals.len();
        self.animals.extend(animals.into_iter().map(|mut animal| {
            animal.city = self.city.clone();
            animal
        }));
        self.likes.insert(user.id, likes);
        self.users.push(user.clone());

        self.persist_all(&[Collection::Users, Collection::Animals, Collection::Likes])?;
        tracing::info!(city = %self.city, user_id = user.id, animals = imported, "User imported");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn store() -> (RegionalStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (RegionalStore::load("Toulouse", backend.clone()), backend)
    }

    #[test]
    fn test_create_animal_forces_city() {
        let (mut store, backend) = store();
        let animal = store
            .create_animal(attrs(json!({"name": "Rex", "city": "Paris"})), None)
            .unwrap();

        assert_eq!(animal.city, "Toulouse");
        assert_eq!(animal.attributes["name"], "Rex");

        let stored: Vec<Animal> = backend.decode(Collection::Animals).unwrap();
        assert_eq!(stored, vec![animal]);
    }

    #[test]
    fn test_create_animal_links_owner() {
        let (mut store, _) = store();
        let user = store.register_user("alice", Attributes::new()).unwrap();
        let animal = store.create_animal(Attributes::new(), Some(user.id)).unwrap();

        assert_eq!(animal.owner_id, Some(user.id));
        assert_eq!(store.user(user.id).unwrap().animal_ids, vec![animal.id]);
    }

    #[test]
    fn test_create_animal_unknown_owner() {
        let (mut store, _) = store();
        let err = store.create_animal(Attributes::new(), Some(99)).unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(store.animals().is_empty());
    }

    #[test]
    fn test_ids_strictly_increase() {
        let (mut store, _) = store();
        let a = store.create_animal(Attributes::new(), None).unwrap();
        let b = store.create_animal(Attributes::new(), None).unwrap();
        let c = store.create_animal(Attributes::new(), None).unwrap();
        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn test_update_animal_ignores_id() {
        let (mut store, _) = store();
        let animal = store.create_animal(attrs(json!({"name": "Rex"})), None).unwrap();

        let updated = store
            .update_animal(animal.id, attrs(json!({"id": 1, "name": "Max", "age": 3})))
            .unwrap();
        assert_eq!(updated.id, animal.id);
        assert_eq!(updated.attributes["name"], "Max");
        assert_eq!(updated.attributes["age"], 3);

        assert!(store.update_animal(1, Attributes::new()).is_err());
    }

    #[test]
    fn test_relocate_changes_local_city() {
        let (mut store, _) = store();
        let animal = store.create_animal(Attributes::new(), None).unwrap();

        let moved = store.relocate(animal.id, "Montpellier").unwrap();
        assert_eq!(moved.city, "Montpellier");
        assert!(store.city_animals().is_empty());
        assert_eq!(store.animals().len(), 1);
    }

    #[test]
    fn test_register_user_requires_username() {
        let (mut store, _) = store();
        let err = store.register_user("   ", Attributes::new()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_profile_includes_likes() {
        let (mut store, _) = store();
        let user = store
            .register_user("alice", attrs(json!({"bio": "cats"})))
            .unwrap();
        store.like(user.id, 42).unwrap();

        let profile = store.profile(user.id).unwrap();
        assert_eq!(profile.likes.liked, vec![42]);
        assert_eq!(profile.user.profile["bio"], "cats");
    }

    #[test]
    fn test_like_cannot_target_self() {
        let (mut store, _) = store();
        assert!(store.like(3, 3).is_err());
    }

    #[test]
    fn test_reload_continues_ids() {
        let backend = Arc::new(MemoryBackend::new());
        let first = {
            let mut store = RegionalStore::load("Toulouse", backend.clone());
            store.create_animal(Attributes::new(), None).unwrap()
        };

        let mut store = RegionalStore::load("Toulouse", backend);
        let second = store.create_animal(Attributes::new(), None).unwrap();
        assert!(second.id > first.id);
        assert_eq!(store.animals().len(), 2);
    }

    #[test]
    fn test_transfer_round_trip_between_stores() {
        let (mut toulouse, _) = store();
        let backend = Arc::new(MemoryBackend::new());
        let mut montpellier = RegionalStore::load("Montpellier", backend);

        let user = toulouse.register_user("alice", Attributes::new()).unwrap();
        let animal = toulouse.create_animal(attrs(json!({"name": "Rex"})), Some(user.id)).unwrap();
        toulouse.create_animal(Attributes::new(), None).unwrap();
        toulouse.like(user.id, 77).unwrap();

        let bundle = toulouse.export_user(user.id).unwrap();
        assert_eq!(bundle.animals.len(), 1);

        let imported = montpellier.import_user(bundle.clone()).unwrap();
        assert_eq!(imported.id, user.id);
        assert_eq!(montpellier.animal(animal.id).unwrap().city, "Montpellier");
        assert_eq!(montpellier.edges(user.id).liked, vec![77]);

        toulouse.remove_user(user.id).unwrap();
        assert!(toulouse.user(user.id).is_err());
        assert_eq!(toulouse.animals().len(), 1);

        let err = montpellier.import_user(bundle).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_only_one_transfer_per_user_in_flight() {
        let (mut store, _) = store();
        let user = store.register_user("alice", Attributes::new()).unwrap();

        store.begin_transfer(user.id).unwrap();
        let err = store.begin_transfer(user.id).unwrap_err();
        assert_eq!(err.status_code(), 409);

        store.abort_transfer(user.id);
        assert!(!store.is_transferring(user.id));
        store.begin_transfer(user.id).unwrap();

        store.finish_transfer(user.id).unwrap();
        assert!(!store.is_transferring(user.id));
        assert!(store.user(user.id).is_err());
    }

    #[test]
    fn test_begin_transfer_of_unknown_user_leaves_no_mark() {
        let (mut store, _) = store();
        assert!(store.begin_transfer(42).is_err());
        assert!(!store.is_transferring(42));
    }
}
