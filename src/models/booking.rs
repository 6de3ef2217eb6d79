use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::TripRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
}

/// What the workflow hands to the booking store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub trip: TripRequest,
    pub estimated_fare: u64,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Uuid,
    pub trip: TripRequest,
    pub estimated_fare: u64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}
