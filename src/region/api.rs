//! REST API handlers for a regional server

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, MessageResponse, Result};
use crate::http::{metrics_handler, HealthResponse, JsonBody, PathParam};
use crate::models::{Animal, Attributes, LikeEdges, Match, RecordId, User};
use crate::utils::normalize_base_url;

use super::likes::LikeOutcome;
use super::server::RegionState;
use super::store::{TransferBundle, UserProfile};

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Body of `/like` and `/unlike`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    #[serde(alias = "userId")]
    pub actor_id: RecordId,
    pub animal_id: RecordId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CityChangeRequest {
    pub new_city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMatchRequest {
    pub animals: [RecordId; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub target_server_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub message: String,
    pub redirect_url: String,
}

/// Public view of the region configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub city: String,
    pub url: String,
    pub master_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sync_interval_secs: u64,
}

// ============================================================================
// API Routes
// ============================================================================

pub fn create_router(state: RegionState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/config", get(get_config))
        // Users
        .route("/users", post(register_user))
        .route("/users/{id}", get(get_user).put(update_user))
        .route("/users/{id}/transfer", post(transfer_user))
        .route("/transfer/receive", post(receive_transfer))
        // Animals
        .route("/animals", get(list_animals).post(create_animal))
        .route("/animals/{id}", put(update_animal))
        .route("/animals/{id}/city", put(relocate_animal))
        .route("/city-animals", get(city_animals))
        // Likes & matches
        .route("/like", post(like))
        .route("/unlike", post(unlike))
        .route("/likes/{actor_id}", get(get_likes))
        .route("/matches", get(list_matches).post(create_match))
        .route("/city-matches", get(city_matches))
        // Master
        .route("/sync-with-master", post(sync_with_master))
        .with_state(state)
}

// ============================================================================
// Health & Config Handlers
// ============================================================================

async fn health_check(State(state): State<RegionState>) -> impl IntoResponse {
    Json(HealthResponse::healthy(
        "region",
        Some(state.config.city.as_str()),
        state.start_time,
    ))
}

async fn get_config(State(state): State<RegionState>) -> Json<PublicConfig> {
    let config = &state.config;
    Json(PublicConfig {
        city: config.city.clone(),
        url: config.advertised_url(),
        master_url: config.master_base_url(),
        latitude: config.latitude,
        longitude: config.longitude,
        sync_interval_secs: config.sync_interval_secs,
    })
}

// ============================================================================
// User Handlers
// ============================================================================

async fn register_user(
    State(state): State<RegionState>,
    JsonBody(mut body): JsonBody<Attributes>,
) -> Result<Json<User>> {
    let username = match body.remove("username") {
        Some(Value::String(name)) => name,
        _ => return Err(Error::validation("username is required")),
    };
    let user = state.store.write().await.register_user(&username, body)?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<RegionState>,
    PathParam(id): PathParam<RecordId>,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.store.read().await.profile(id)?))
}

async fn update_user(
    State(state): State<RegionState>,
    PathParam(id): PathParam<RecordId>,
    JsonBody(patch): JsonBody<Attributes>,
) -> Result<Json<User>> {
    Ok(Json(state.store.write().await.update_user(id, patch)?))
}

/// Hand a user over to another region, then forget them locally
async fn transfer_user(
    State(state): State<RegionState>,
    PathParam(id): PathParam<RecordId>,
    JsonBody(request): JsonBody<TransferRequest>,
) -> Result<Json<TransferResponse>> {
    let target = normalize_base_url(&request.target_server_url)?;
    let bundle = state.store.write().await.begin_transfer(id)?;

    if let Err(e) = state.client.send_transfer(&target, &bundle).await {
        tracing::warn!(user_id = id, target = %target, "Transfer failed: {}", e);
        state.store.write().await.abort_transfer(id);
        return Err(e.into());
    }

    state.store.write().await.finish_transfer(id)?;
    tracing::info!(user_id = id, target = %target, "User transferred");

    Ok(Json(TransferResponse {
        message: format!("User {id} transferred"),
        redirect_url: target,
    }))
}

async fn receive_transfer(
    State(state): State<RegionState>,
    JsonBody(bundle): JsonBody<TransferBundle>,
) -> Result<Json<MessageResponse>> {
    let user = state.store.write().await.import_user(bundle)?;
    Ok(Json(MessageResponse::new(format!(
        "User {} received in {}",
        user.id, state.config.city
    ))))
}

// ============================================================================
// Animal Handlers
// ============================================================================

async fn list_animals(State(state): State<RegionState>) -> Json<Vec<Animal>> {
    Json(state.store.read().await.animals().to_vec())
}

async fn create_animal(
    State(state): State<RegionState>,
    JsonBody(mut body): JsonBody<Attributes>,
) -> Result<Json<Animal>> {
    let owner_id = match body.remove("ownerId") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<RecordId>(value)
                .map_err(|_| Error::validation("ownerId must be a numeric id or null"))?,
        ),
    };
    let animal = state.store.write().await.create_animal(body, owner_id)?;
    Ok(Json(animal))
}

async fn update_animal(
    State(state): State<RegionState>,
    PathParam(id): PathParam<RecordId>,
    JsonBody(patch): JsonBody<Attributes>,
) -> Result<Json<Animal>> {
    Ok(Json(state.store.write().await.update_animal(id, patch)?))
}

/// Move an animal locally and notify the master in the background
async fn relocate_animal(
    State(state): State<RegionState>,
    PathParam(id): PathParam<RecordId>,
    JsonBody(request): JsonBody<CityChangeRequest>,
) -> Result<Json<Animal>> {
    let animal = state.store.write().await.relocate(id, &request.new_city)?;

    let client = state.client.clone();
    let new_city = animal.city.clone();
    tokio::spawn(async move {
        match client.notify_relocation(id, &new_city).await {
            Ok(_) => tracing::debug!(animal_id = id, "Master notified of relocation"),
            Err(e) => tracing::warn!(animal_id = id, "Relocation notice failed: {}", e),
        }
    });

    Ok(Json(animal))
}

async fn city_animals(State(state): State<RegionState>) -> Json<Vec<Animal>> {
    Json(state.store.read().await.city_animals())
}

// ============================================================================
// Like & Match Handlers
// ============================================================================

async fn like(
    State(state): State<RegionState>,
    JsonBody(request): JsonBody<LikeRequest>,
) -> Result<Json<LikeOutcome>> {
    let outcome = state
        .store
        .write()
        .await
        .like(request.actor_id, request.animal_id)?;
    Ok(Json(outcome))
}

async fn unlike(
    State(state): State<RegionState>,
    JsonBody(request): JsonBody<LikeRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .store
        .write()
        .await
        .unlike(request.actor_id, request.animal_id)?;
    Ok(Json(MessageResponse::new("Unlike recorded")))
}

async fn get_likes(
    State(state): State<RegionState>,
    PathParam(actor_id): PathParam<RecordId>,
) -> Json<LikeEdges> {
    Json(state.store.read().await.edges(actor_id))
}

async fn list_matches(State(state): State<RegionState>) -> Json<Vec<Match>> {
    Json(state.store.read().await.matches().to_vec())
}

async fn create_match(
    State(state): State<RegionState>,
    JsonBody(request): JsonBody<NewMatchRequest>,
) -> Result<Json<Match>> {
    Ok(Json(state.store.write().await.add_match(request.animals)?))
}

async fn city_matches(State(state): State<RegionState>) -> Json<Vec<Match>> {
    Json(state.store.read().await.city_matches())
}

// ============================================================================
// Master Handlers
// ============================================================================

/// Push to the master now and relay its answer
async fn sync_with_master(State(state): State<RegionState>) -> Result<Json<MessageResponse>> {
    let response = state.runner.push_once().await.map_err(|e| {
        tracing::warn!("Manual sync failed: {}", e);
        Error::from(e)
    })?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_like_request_accepts_user_id_alias() {
        let request: LikeRequest = serde_json::from_value(json!({"userId": 1, "animalId": 2})).unwrap();
        assert_eq!(request.actor_id, 1);

        let request: LikeRequest = serde_json::from_value(json!({"actorId": 3, "animalId": 4})).unwrap();
        assert_eq!(request.actor_id, 3);
    }

    #[test]
    fn test_transfer_response_wire_format() {
        let response = TransferResponse {
            message: "ok".to_string(),
            redirect_url: "http://localhost:3002".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["redirectUrl"], "http://localhost:3002");
    }
}
