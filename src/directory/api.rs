//! REST API handlers for the master directory

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::error::{MessageResponse, Result};
use crate::http::{metrics_handler, HealthResponse, JsonBody, QueryParam};
use crate::models::{Animal, City};

use super::aggregate::{FlatSnapshot, RelocationRequest, SyncRequest};
use super::registry::{RegisterCityRequest, RegisterOutcome};
use super::routing::{Nearest, NearestQuery};
use super::server::DirectoryState;
use super::DirectoryStats;

// ============================================================================
// API Routes
// ============================================================================

/// Create the master router
pub fn create_router(state: DirectoryState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Region-facing endpoints
        .route("/register", post(register_city))
        .route("/sync", post(sync_city))
        .route("/updateCity", post(update_city))
        // Client-facing endpoints
        .route("/nearest", get(nearest_by_query).post(nearest_by_body))
        .route("/stats", get(get_stats))
        .route("/cities", get(list_cities))
        .route("/aggregated", get(get_aggregated))
        .with_state(state)
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn health_check(State(state): State<DirectoryState>) -> impl IntoResponse {
    Json(HealthResponse::healthy("master", None, state.start_time))
}

// ============================================================================
// Region Handlers
// ============================================================================

/// Register or refresh a city
async fn register_city(
    State(state): State<DirectoryState>,
    JsonBody(request): JsonBody<RegisterCityRequest>,
) -> Result<Json<MessageResponse>> {
    let city = request.city.trim().to_string();
    let outcome = state.directory.write().await.register(request)?;

    let message = match outcome {
        RegisterOutcome::Created => format!("City {city} registered"),
        RegisterOutcome::Updated => format!("City {city} updated"),
    };
    Ok(Json(MessageResponse::new(message)))
}

/// Replace the slice pushed by a region
async fn sync_city(
    State(state): State<DirectoryState>,
    JsonBody(request): JsonBody<SyncRequest>,
) -> Result<Json<MessageResponse>> {
    state.directory.write().await.sync(&request.city, request.data)?;
    Ok(Json(MessageResponse::new(format!(
        "Data synchronized for {}",
        request.city.trim()
    ))))
}

/// Relocate the aggregated copy of an animal
async fn update_city(
    State(state): State<DirectoryState>,
    JsonBody(request): JsonBody<RelocationRequest>,
) -> Result<Json<Animal>> {
    let animal = state
        .directory
        .write()
        .await
        .update_city(request.id, &request.new_city)?;
    Ok(Json(animal))
}

// ============================================================================
// Client Handlers
// ============================================================================

async fn nearest_by_query(
    State(state): State<DirectoryState>,
    QueryParam(query): QueryParam<NearestQuery>,
) -> Result<Json<Nearest>> {
    nearest(&state, query).await
}

async fn nearest_by_body(
    State(state): State<DirectoryState>,
    JsonBody(query): JsonBody<NearestQuery>,
) -> Result<Json<Nearest>> {
    nearest(&state, query).await
}

async fn nearest(state: &DirectoryState, query: NearestQuery) -> Result<Json<Nearest>> {
    let nearest = state
        .directory
        .read()
        .await
        .find_nearest(query.latitude, query.longitude)?;

    tracing::debug!(
        latitude = query.latitude,
        longitude = query.longitude,
        city = %nearest.city,
        distance_km = nearest.distance_km,
        "Routed client"
    );
    Ok(Json(nearest))
}

async fn get_stats(State(state): State<DirectoryState>) -> Json<DirectoryStats> {
    Json(state.directory.read().await.stats())
}

async fn list_cities(State(state): State<DirectoryState>) -> Json<Vec<City>> {
    Json(state.directory.read().await.cities().to_vec())
}

async fn get_aggregated(State(state): State<DirectoryState>) -> Json<FlatSnapshot> {
    Json(state.directory.read().await.snapshot().flatten())
}
