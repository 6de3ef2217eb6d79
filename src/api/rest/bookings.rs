use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::estimates::TripPayload;
use crate::engine::dispatch::{cancel_tracking, confirm_booking, ConfirmedBooking};
use crate::error::AppError;
use crate::models::booking::BookingRecord;
use crate::models::provider::AssignmentSet;
use crate::models::tracking::TrackingState;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/:id", get(get_booking))
        .route(
            "/bookings/:id/tracking",
            get(get_tracking).delete(stop_tracking),
        )
}

fn default_providers() -> i64 {
    1
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    #[serde(flatten)]
    pub trip: TripPayload,
    #[serde(default = "default_providers")]
    pub providers: i64,
}

#[derive(Serialize)]
pub struct BookingView {
    pub booking: BookingRecord,
    pub providers: Option<AssignmentSet>,
    pub tracking: Option<TrackingState>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<ConfirmedBooking>, AppError> {
    let request = payload.trip.into_request()?;
    let provider_count = payload.providers.clamp(1, 3) as usize;

    let confirmed = confirm_booking(&state, request, provider_count).await?;
    Ok(Json(confirmed))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    let booking = state
        .bookings
        .get(id)
        .await
        .map_err(|err| AppError::ExternalUnavailable(err.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("booking {} not found", id)))?;

    let (providers, tracking) = match state.active.get(&id) {
        Some(active) => (Some(active.providers.clone()), Some(active.observer.latest())),
        None => (None, None),
    };

    Ok(Json(BookingView {
        booking,
        providers,
        tracking,
    }))
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingState>, AppError> {
    let active = state
        .active
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no tracking for booking {}", id)))?;

    Ok(Json(active.observer.latest()))
}

async fn stop_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if cancel_tracking(&state, id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "no running tracking for booking {}",
            id
        )))
    }
}
