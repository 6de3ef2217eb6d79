use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::engine::rng::SimRng;
use crate::engine::scheduler::{TrackingObserver, TrackingScheduler};
use crate::external::bookings::BookingStore;
use crate::external::geocode::AddressResolver;
use crate::models::provider::AssignmentSet;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub sim_seconds_per_tick: f64,
    pub event_buffer_size: usize,
    /// How long a stopped session's last state stays readable.
    pub retention: Duration,
    pub seed: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3),
            sim_seconds_per_tick: 3.0,
            event_buffer_size: 64,
            retention: Duration::from_secs(300),
            seed: None,
        }
    }
}

/// A confirmed booking's live simulation. Evicted once the session has
/// been stopped for the retention period, or right away on cancel.
pub struct ActiveBooking {
    pub providers: AssignmentSet,
    pub observer: TrackingObserver,
    pub abort: AbortHandle,
}

impl ActiveBooking {
    pub fn is_running(&self) -> bool {
        !self.abort.is_finished()
    }
}

pub struct AppState {
    pub bookings: Arc<dyn BookingStore>,
    pub geocoder: Arc<dyn AddressResolver>,
    pub active: DashMap<Uuid, ActiveBooking>,
    pub scheduler: TrackingScheduler,
    pub event_buffer_size: usize,
    pub retention: Duration,
    pub metrics: Metrics,
    rng: Mutex<SimRng>,
}

impl AppState {
    pub fn new(
        settings: EngineSettings,
        bookings: Arc<dyn BookingStore>,
        geocoder: Arc<dyn AddressResolver>,
    ) -> Self {
        Self {
            bookings,
            geocoder,
            active: DashMap::new(),
            scheduler: TrackingScheduler::new(
                settings.tick_interval,
                settings.sim_seconds_per_tick,
            ),
            event_buffer_size: settings.event_buffer_size,
            retention: settings.retention,
            metrics: Metrics::new(),
            rng: Mutex::new(SimRng::from_optional_seed(settings.seed)),
        }
    }

    /// Independent generator for one booking.
    pub fn booking_rng(&self) -> SimRng {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.fork()
    }
}
