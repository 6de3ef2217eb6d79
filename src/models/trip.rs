use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geo;
use crate::models::coordinate::Coordinate;

/// Label stored for a point picked on the map rather than from a search.
pub const UNLABELED_LOCATION: &str = "Selected on map";

/// Display names for both ends of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLabels {
    pub pickup: String,
    pub dropoff: String,
}

impl Default for AddressLabels {
    fn default() -> Self {
        Self {
            pickup: UNLABELED_LOCATION.to_string(),
            dropoff: UNLABELED_LOCATION.to_string(),
        }
    }
}

impl AddressLabels {
    /// Blank or missing labels fall back to [`UNLABELED_LOCATION`].
    pub fn new(pickup: Option<String>, dropoff: Option<String>) -> Self {
        Self {
            pickup: label_or_default(pickup),
            dropoff: label_or_default(dropoff),
        }
    }
}

fn label_or_default(label: Option<String>) -> String {
    label
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| UNLABELED_LOCATION.to_string())
}

/// A traveler's booking form as submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub pickup: Coordinate,
    pub dropoff: Coordinate,
    #[serde(default)]
    pub labels: AddressLabels,
    pub bag_count: u32,
    pub bag_types: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TripRequest {
    /// A request without any bag type selected can be estimated but not booked.
    pub fn is_confirmable(&self) -> bool {
        !self.bag_types.is_empty()
    }
}

/// A trip request together with its great-circle distance, computed once and
/// shared by the fare, the booking record and the tracking session.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTrip {
    pub request: TripRequest,
    pub distance_km: f64,
}

impl PlannedTrip {
    pub fn plan(request: TripRequest) -> Self {
        let distance_km = geo::distance(&request.pickup, &request.dropoff);
        Self {
            request,
            distance_km,
        }
    }
}
