use crate::models::fare::FareBreakdown;
use crate::models::trip::{PlannedTrip, TripRequest};

pub const BASE_FARE: u32 = 60;
pub const PER_KM_RATE: f64 = 20.0;
pub const DEFAULT_BAG_FEE: u32 = 20;

const BAG_FEES: &[(&str, u32)] = &[
    ("Suitcase", 50),
    ("Trolley bag", 40),
    ("Instrument case", 45),
    ("Duffel", 35),
    ("Carton", 35),
    ("Stroller", 25),
    ("Backpack", 15),
    ("Laptop bag", 10),
];

pub fn bag_type_fee(bag_type: &str) -> u32 {
    BAG_FEES
        .iter()
        .find(|(name, _)| *name == bag_type)
        .map(|(_, fee)| *fee)
        .unwrap_or(DEFAULT_BAG_FEE)
}

pub fn estimate(request: &TripRequest) -> FareBreakdown {
    let trip = PlannedTrip::plan(request.clone());
    estimate_trip(&trip)
}

pub fn estimate_trip(trip: &PlannedTrip) -> FareBreakdown {
    estimate_for_distance(&trip.request, trip.distance_km)
}

pub fn estimate_for_distance(request: &TripRequest, distance_km: f64) -> FareBreakdown {
    let distance_km = distance_km.max(0.0);
    let distance_fare = distance_km * PER_KM_RATE;
    let bag_fee = u64::from(average_bag_fee(request)) * u64::from(request.bag_count);
    let total = (BASE_FARE as f64 + distance_fare + bag_fee as f64).round() as u64;

    FareBreakdown {
        base_fare: BASE_FARE,
        distance_km: (distance_km * 100.0).round() / 100.0,
        distance_fare,
        bag_fee,
        total,
    }
}

/// Mean fee of the selected bag types, rounded to a whole currency unit.
/// Applied uniformly to every bag regardless of which type it is.
fn average_bag_fee(request: &TripRequest) -> u32 {
    if request.bag_types.is_empty() {
        return 0;
    }

    let sum: u32 = request.bag_types.iter().map(|t| bag_type_fee(t)).sum();
    (sum as f64 / request.bag_types.len() as f64).round() as u32
}
