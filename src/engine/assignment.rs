use std::collections::HashSet;

use rand::Rng;
use rand::seq::index;
use tracing::debug;

use crate::models::provider::{AssignmentSet, Provider};

pub const MIN_PROVIDERS: usize = 1;
pub const MAX_PROVIDERS: usize = 3;

const NAME_POOL: &[&str] = &[
    "Aman Kumar",
    "Rohit Singh",
    "Vikas Yadav",
    "Arjun Verma",
    "Sandeep Sharma",
    "Deepak Mishra",
    "Anil Chauhan",
    "Ravi Tiwari",
    "Vivek Gupta",
    "Pawan Pandey",
    "Mukesh Thakur",
    "Nitin Joshi",
    "Rajeev Rathi",
    "Harish Mehta",
    "Kunal Saxena",
];

/// Minutes per kilometer used to turn a provider's distance into an ETA.
pub const MINUTES_PER_KM: f64 = 10.0;
const MIN_ETA_MINUTES: u32 = 3;

/// Simulates a dispatch of `count` providers (clamped into 1..=3). The first
/// provider is the lead; the rest keep their draw order.
pub fn assign<R: Rng + ?Sized>(count: usize, rng: &mut R) -> AssignmentSet {
    let count = count
        .clamp(MIN_PROVIDERS, MAX_PROVIDERS)
        .min(NAME_POOL.len());

    let mut used_ids = HashSet::with_capacity(count);
    let providers: Vec<Provider> = index::sample(rng, NAME_POOL.len(), count)
        .into_iter()
        .enumerate()
        .map(|(rank, name_idx)| {
            let id = unique_id(rng, &mut used_ids);
            synthesize(rng, id, NAME_POOL[name_idx], rank == 0)
        })
        .collect();

    debug!(
        providers = providers.len(),
        lead = providers.first().map(|p| p.name.as_str()).unwrap_or_default(),
        "providers assigned"
    );

    AssignmentSet::new(providers)
}

pub fn eta_for_distance(distance_km: f64) -> u32 {
    ((distance_km * MINUTES_PER_KM).round() as u32).max(MIN_ETA_MINUTES)
}

fn synthesize<R: Rng + ?Sized>(rng: &mut R, id: u32, name: &str, is_lead: bool) -> Provider {
    let initial_distance_km = rng.gen_range(0.2..2.2);

    Provider {
        id,
        name: name.to_string(),
        rating: rng.gen_range(4.6..5.0),
        completed_jobs: rng.gen_range(50..250),
        initial_distance_km,
        eta_minutes: eta_for_distance(initial_distance_km),
        is_lead,
    }
}

fn unique_id<R: Rng + ?Sized>(rng: &mut R, used: &mut HashSet<u32>) -> u32 {
    loop {
        let id = rng.gen_range(1000..10_000);
        if used.insert(id) {
            return id;
        }
    }
}
