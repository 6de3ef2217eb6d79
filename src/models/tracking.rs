use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingPhase {
    EnRouteToPickup,
    EnRouteToDropoff,
    Arrived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    pub current_position: Coordinate,
    pub phase: TrackingPhase,
    pub remaining_distance_km: f64,
    pub eta_minutes: u32,
}

impl TrackingState {
    pub fn has_arrived(&self) -> bool {
        self.phase == TrackingPhase::Arrived
    }
}
