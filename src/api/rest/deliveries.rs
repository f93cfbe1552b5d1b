use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::models::delivery::RawDeliveryRecord;
use crate::models::driver::DriverProfile;
use crate::models::location::DriverLocation;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/snapshots", post(publish_snapshot))
        .route("/drivers/:id/location", post(publish_driver_location))
        .route("/drivers/:id/profile", put(put_driver_profile))
}

#[derive(Deserialize)]
pub struct UpsertProfileRequest {
    pub name: String,
    pub phone_number: Option<String>,
    pub vehicle_plate: Option<String>,
    pub rating: Option<f64>,
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RawDeliveryRecord>, AppError> {
    state
        .feeds
        .latest_delivery(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
}

async fn publish_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut snapshot): Json<RawDeliveryRecord>,
) -> Result<StatusCode, AppError> {
    if !snapshot.id.is_empty() && snapshot.id != id {
        return Err(AppError::BadRequest(format!(
            "snapshot id {} does not match path id {id}",
            snapshot.id
        )));
    }

    snapshot.id = id;
    debug!(delivery_id = %snapshot.id, status = ?snapshot.status, "snapshot published");
    state.feeds.publish_delivery(snapshot);

    Ok(StatusCode::ACCEPTED)
}

async fn publish_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(location): Json<DriverLocation>,
) -> Result<StatusCode, AppError> {
    if !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(AppError::BadRequest("coordinates out of range".to_string()));
    }

    state.feeds.publish_driver_location(&id, location);
    Ok(StatusCode::ACCEPTED)
}

async fn put_driver_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpsertProfileRequest>,
) -> Result<Json<DriverProfile>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let profile = DriverProfile {
        id,
        name: payload.name,
        phone_number: payload.phone_number,
        vehicle_plate: payload.vehicle_plate,
        rating: payload.rating.map(|rating| rating.clamp(0.0, 5.0)),
    };

    state.feeds.put_driver_profile(profile.clone());
    Ok(Json(profile))
}
