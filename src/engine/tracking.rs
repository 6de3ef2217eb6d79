use rand::Rng;
use thiserror::Error;

use crate::engine::assignment::MINUTES_PER_KM;
use crate::geo;
use crate::models::coordinate::Coordinate;
use crate::models::provider::Provider;
use crate::models::tracking::{TrackingPhase, TrackingState};
use crate::models::trip::PlannedTrip;

pub const ARRIVAL_THRESHOLD_KM: f64 = 0.05;

/// Average porter pace, matching the assignment ETA rule.
pub const AVERAGE_SPEED_KM_PER_SEC: f64 = 1.0 / (MINUTES_PER_KM * 60.0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingFault {
    #[error("non-finite coordinate in tracking session")]
    NonFiniteCoordinate,

    #[error("invalid tick interval: {0}s")]
    InvalidInterval(f64),
}

/// One provider's simulated journey: to the pickup, then on to the drop-off.
#[derive(Debug, Clone)]
pub struct TrackingSession {
    pickup: Coordinate,
    dropoff: Coordinate,
    trip_distance_km: f64,
    speed_km_per_sec: f64,
    state: TrackingState,
}

impl TrackingSession {
    /// Places the lead provider `initial_distance_km` away from the pickup on
    /// a random bearing.
    pub fn start<R: Rng + ?Sized>(trip: &PlannedTrip, lead: &Provider, rng: &mut R) -> Self {
        let bearing = rng.gen_range(0.0..360.0);
        Self::start_with_bearing(trip, lead, bearing)
    }

    pub fn start_with_bearing(trip: &PlannedTrip, lead: &Provider, bearing_degrees: f64) -> Self {
        let pickup = trip.request.pickup;
        let remaining = lead.initial_distance_km.max(0.0);
        let speed = phase_speed(remaining, lead.eta_minutes);

        Self {
            pickup,
            dropoff: trip.request.dropoff,
            trip_distance_km: trip.distance_km,
            speed_km_per_sec: speed,
            state: TrackingState {
                current_position: geo::project(&pickup, bearing_degrees, remaining),
                phase: TrackingPhase::EnRouteToPickup,
                remaining_distance_km: remaining,
                eta_minutes: lead.eta_minutes,
            },
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn into_state(self) -> TrackingState {
        self.state
    }

    pub fn speed_km_per_sec(&self) -> f64 {
        self.speed_km_per_sec
    }

    /// Advances the provider by `dt_secs` of simulated time. Once arrived the
    /// state is frozen and further ticks return it unchanged. A fault leaves
    /// the state as it was.
    pub fn tick(&mut self, dt_secs: f64) -> Result<&TrackingState, TrackingFault> {
        if self.state.has_arrived() {
            return Ok(&self.state);
        }
        if !dt_secs.is_finite() || dt_secs < 0.0 {
            return Err(TrackingFault::InvalidInterval(dt_secs));
        }

        let target = self.target();
        let current = self.state.current_position;
        if !current.is_finite() || !target.is_finite() {
            return Err(TrackingFault::NonFiniteCoordinate);
        }

        let step = self.speed_km_per_sec * dt_secs;
        let to_target = geo::distance(&current, &target);
        let next = if step >= to_target {
            target
        } else {
            geo::project(&current, geo::initial_bearing(&current, &target), step)
        };
        if !next.is_finite() {
            return Err(TrackingFault::NonFiniteCoordinate);
        }

        let remaining = geo::distance(&next, &target);
        self.state.current_position = next;
        self.state.remaining_distance_km = remaining;

        if remaining < ARRIVAL_THRESHOLD_KM {
            self.advance_phase();
        } else {
            self.state.eta_minutes = eta_minutes(remaining, self.speed_km_per_sec);
        }

        Ok(&self.state)
    }

    fn target(&self) -> Coordinate {
        match self.state.phase {
            TrackingPhase::EnRouteToPickup => self.pickup,
            TrackingPhase::EnRouteToDropoff | TrackingPhase::Arrived => self.dropoff,
        }
    }

    fn advance_phase(&mut self) {
        match self.state.phase {
            TrackingPhase::EnRouteToPickup => {
                self.speed_km_per_sec = AVERAGE_SPEED_KM_PER_SEC;
                self.state = TrackingState {
                    current_position: self.pickup,
                    phase: TrackingPhase::EnRouteToDropoff,
                    remaining_distance_km: self.trip_distance_km,
                    eta_minutes: eta_minutes(self.trip_distance_km, self.speed_km_per_sec),
                };
            }
            TrackingPhase::EnRouteToDropoff => {
                self.state = TrackingState {
                    current_position: self.dropoff,
                    phase: TrackingPhase::Arrived,
                    remaining_distance_km: 0.0,
                    eta_minutes: 0,
                };
            }
            TrackingPhase::Arrived => {}
        }
    }
}

fn phase_speed(distance_km: f64, eta_minutes: u32) -> f64 {
    if distance_km <= 0.0 || eta_minutes == 0 {
        return AVERAGE_SPEED_KM_PER_SEC;
    }
    distance_km / (eta_minutes as f64 * 60.0)
}

fn eta_minutes(remaining_km: f64, speed_km_per_sec: f64) -> u32 {
    (remaining_km / speed_km_per_sec / 60.0).ceil() as u32
}
