use std::collections::BTreeSet;
use std::sync::Arc;

use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::fare::estimate_trip;
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::fare::FareBreakdown;
use crate::models::trip::{AddressLabels, PlannedTrip, TripRequest};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/estimates", post(create_estimate))
}

/// Booking form as sent by the client. Bag count is clamped to zero rather
/// than rejected; coordinates out of range are rejected.
#[derive(Debug, Deserialize)]
pub struct TripPayload {
    pub pickup: Coordinate,
    pub dropoff: Coordinate,
    #[serde(default)]
    pub pickup_address: Option<String>,
    #[serde(default)]
    pub dropoff_address: Option<String>,
    #[serde(default)]
    pub bag_count: i64,
    #[serde(default)]
    pub bag_types: BTreeSet<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TripPayload {
    pub fn into_request(self) -> Result<TripRequest, AppError> {
        self.pickup.validate()?;
        self.dropoff.validate()?;

        Ok(TripRequest {
            pickup: self.pickup,
            dropoff: self.dropoff,
            labels: AddressLabels::new(self.pickup_address, self.dropoff_address),
            bag_count: self.bag_count.clamp(0, u32::MAX as i64) as u32,
            bag_types: self.bag_types,
            note: self.note.filter(|note| !note.trim().is_empty()),
        })
    }
}

#[derive(Serialize)]
pub struct EstimateResponse {
    pub fare: FareBreakdown,
    pub confirmable: bool,
}

async fn create_estimate(
    Json(payload): Json<TripPayload>,
) -> Result<Json<EstimateResponse>, AppError> {
    let trip = PlannedTrip::plan(payload.into_request()?);

    Ok(Json(EstimateResponse {
        fare: estimate_trip(&trip),
        confirmable: trip.request.is_confirmable(),
    }))
}
