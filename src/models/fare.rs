use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareBreakdown {
    pub base_fare: u32,
    /// Rounded to 2 decimals for display.
    pub distance_km: f64,
    pub distance_fare: f64,
    pub bag_fee: u64,
    pub total: u64,
}
