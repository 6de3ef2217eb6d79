use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::engine::assignment::assign;
use crate::engine::fare::estimate_trip;
use crate::engine::scheduler::{TrackingFeed, TrackingHandle};
use crate::engine::tracking::TrackingSession;
use crate::error::AppError;
use crate::models::booking::{BookingStatus, NewBooking};
use crate::models::fare::FareBreakdown;
use crate::models::provider::AssignmentSet;
use crate::models::tracking::TrackingState;
use crate::models::trip::{PlannedTrip, TripRequest};
use crate::state::{ActiveBooking, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedBooking {
    pub booking_id: Uuid,
    pub fare: FareBreakdown,
    pub providers: AssignmentSet,
    pub tracking: TrackingState,
}

/// Estimates, persists, assigns providers and starts live tracking for a
/// booking. Nothing is assigned unless the store accepted the booking.
pub async fn confirm_booking(
    state: &Arc<AppState>,
    request: TripRequest,
    provider_count: usize,
) -> Result<ConfirmedBooking, AppError> {
    if !request.is_confirmable() {
        return Err(AppError::BadRequest(
            "select at least one bag type to confirm".to_string(),
        ));
    }
    request.pickup.validate()?;
    request.dropoff.validate()?;

    let trip = PlannedTrip::plan(request);
    let fare = estimate_trip(&trip);

    let booking_id = match state
        .bookings
        .create(NewBooking {
            trip: trip.request.clone(),
            estimated_fare: fare.total,
            status: BookingStatus::Pending,
        })
        .await
    {
        Ok(id) => id,
        Err(err) => {
            state
                .metrics
                .bookings_total
                .with_label_values(&["store_error"])
                .inc();
            error!(error = %err, "failed to persist booking");
            return Err(err.into());
        }
    };

    let mut rng = state.booking_rng();
    let providers = assign(provider_count, &mut rng);
    let lead = providers
        .lead()
        .ok_or_else(|| AppError::Internal("assignment produced no lead provider".to_string()))?;

    let session = TrackingSession::start(&trip, lead, &mut rng);
    let tracking = session.state().clone();
    let (feed, observer) = TrackingFeed::channel(tracking.clone(), state.event_buffer_size);
    let handle = state
        .scheduler
        .spawn(booking_id, session, feed, state.metrics.clone());

    state.active.insert(
        booking_id,
        ActiveBooking {
            providers: providers.clone(),
            observer,
            abort: handle.abort_handle(),
        },
    );
    tokio::spawn(evict_when_stopped(Arc::clone(state), booking_id, handle));

    state
        .metrics
        .bookings_total
        .with_label_values(&["confirmed"])
        .inc();
    state.metrics.fare_estimate_total.observe(fare.total as f64);

    info!(
        %booking_id,
        distance_km = fare.distance_km,
        total = fare.total,
        providers = providers.len(),
        "booking confirmed"
    );

    Ok(ConfirmedBooking {
        booking_id,
        fare,
        providers,
        tracking,
    })
}

/// Stops and forgets the simulation for a booking. Observers see their
/// streams end. Returns false if none is running.
pub fn cancel_tracking(state: &AppState, booking_id: Uuid) -> bool {
    match state
        .active
        .remove_if(&booking_id, |_, active| active.is_running())
    {
        Some((_, active)) => {
            active.abort.abort();
            info!(%booking_id, "tracking cancelled");
            true
        }
        None => false,
    }
}

/// Keeps the last state of a stopped session readable for the retention
/// period, then drops it.
async fn evict_when_stopped(state: Arc<AppState>, booking_id: Uuid, handle: TrackingHandle) {
    if handle.join().await.is_none() {
        debug!(%booking_id, "tracking task ended without arriving");
    }

    tokio::time::sleep(state.retention).await;
    if state.active.remove(&booking_id).is_some() {
        debug!(%booking_id, "tracking evicted");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::{self, BoxFuture};
    use futures::{FutureExt, StreamExt};
    use uuid::Uuid;

    use super::{cancel_tracking, confirm_booking};
    use crate::error::AppError;
    use crate::external::bookings::{BookingStore, InMemoryBookingStore, StoreError};
    use crate::external::geocode::{AddressResolver, AddressSuggestion};
    use crate::geo;
    use crate::models::booking::{BookingRecord, NewBooking};
    use crate::models::coordinate::Coordinate;
    use crate::models::tracking::TrackingPhase;
    use crate::models::trip::{AddressLabels, TripRequest};
    use crate::state::{AppState, EngineSettings};

    struct NoResolver;

    impl AddressResolver for NoResolver {
        fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Vec<AddressSuggestion>> {
            future::ready(Vec::new()).boxed()
        }
    }

    struct DownStore;

    impl BookingStore for DownStore {
        fn create(&self, _booking: NewBooking) -> BoxFuture<'_, Result<Uuid, StoreError>> {
            future::ready(Err(StoreError::Unavailable("connection refused".to_string()))).boxed()
        }

        fn get(&self, _id: Uuid) -> BoxFuture<'_, Result<Option<BookingRecord>, StoreError>> {
            future::ready(Ok(None)).boxed()
        }
    }

    fn state_with(store: Arc<dyn BookingStore>) -> Arc<AppState> {
        state_ticking(store, Duration::from_secs(3600), Duration::from_secs(300))
    }

    fn state_ticking(
        store: Arc<dyn BookingStore>,
        tick_interval: Duration,
        retention: Duration,
    ) -> Arc<AppState> {
        Arc::new(AppState::new(
            EngineSettings {
                tick_interval,
                sim_seconds_per_tick: 120.0,
                event_buffer_size: 16,
                retention,
                seed: Some(2024),
            },
            store,
            Arc::new(NoResolver),
        ))
    }

    fn request(types: &[&str]) -> TripRequest {
        let pickup = Coordinate {
            latitude: 13.0827,
            longitude: 80.2707,
        };
        TripRequest {
            pickup,
            dropoff: geo::project(&pickup, 30.0, 2.5),
            labels: AddressLabels::default(),
            bag_count: 3,
            bag_types: types.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            note: None,
        }
    }

    #[tokio::test]
    async fn confirmed_booking_is_persisted_and_tracked() {
        let store = Arc::new(InMemoryBookingStore::new());
        let state = state_with(store.clone());

        let confirmed = confirm_booking(&state, request(&["Suitcase"]), 2)
            .await
            .unwrap();

        let record = store.get(confirmed.booking_id).await.unwrap().unwrap();
        assert_eq!(record.estimated_fare, confirmed.fare.total);
        assert_eq!(confirmed.providers.len(), 2);
        assert_eq!(confirmed.tracking.phase, TrackingPhase::EnRouteToPickup);
        assert_eq!(
            confirmed.tracking.eta_minutes,
            confirmed.providers.lead().unwrap().eta_minutes
        );
        assert!(state.active.contains_key(&confirmed.booking_id));

        assert!(cancel_tracking(&state, confirmed.booking_id));
    }

    #[tokio::test]
    async fn cancel_evicts_booking_and_ends_followers() {
        let state = state_with(Arc::new(InMemoryBookingStore::new()));
        let confirmed = confirm_booking(&state, request(&["Suitcase"]), 1)
            .await
            .unwrap();
        let follower = state
            .active
            .get(&confirmed.booking_id)
            .unwrap()
            .observer
            .follow();

        assert!(cancel_tracking(&state, confirmed.booking_id));
        assert!(!state.active.contains_key(&confirmed.booking_id));
        assert!(!cancel_tracking(&state, confirmed.booking_id));

        let states = tokio::time::timeout(Duration::from_secs(2), follower.collect::<Vec<_>>())
            .await
            .expect("follower ends after cancel");
        assert!(states.iter().all(|s| !s.has_arrived()));
    }

    #[tokio::test]
    async fn arrived_booking_is_evicted_after_retention() {
        let state = state_ticking(
            Arc::new(InMemoryBookingStore::new()),
            Duration::from_millis(1),
            Duration::from_millis(50),
        );
        let confirmed = confirm_booking(&state, request(&["Backpack"]), 1)
            .await
            .unwrap();
        let follower = state
            .active
            .get(&confirmed.booking_id)
            .unwrap()
            .observer
            .follow();

        let states: Vec<_> = follower.collect().await;
        assert!(states.last().unwrap().has_arrived());

        let mut evicted = false;
        for _ in 0..200 {
            if !state.active.contains_key(&confirmed.booking_id) {
                evicted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(evicted);
        assert_eq!(state.metrics.tracking_sessions_active.get(), 0);
    }

    #[tokio::test]
    async fn booking_without_bag_types_is_rejected() {
        let store = Arc::new(InMemoryBookingStore::new());
        let state = state_with(store.clone());

        let result = confirm_booking(&state, request(&[]), 1).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_reported_without_starting_tracking() {
        let state = state_with(Arc::new(DownStore));

        let result = confirm_booking(&state, request(&["Backpack"]), 1).await;

        assert!(matches!(result, Err(AppError::ExternalUnavailable(_))));
        assert!(state.active.is_empty());
        assert_eq!(state.metrics.tracking_sessions_active.get(), 0);
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected() {
        let state = state_with(Arc::new(InMemoryBookingStore::new()));
        let mut bad = request(&["Backpack"]);
        bad.pickup.latitude = 123.0;

        let result = confirm_booking(&state, bad, 1).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn cancelling_unknown_booking_is_a_no_op() {
        let state = state_with(Arc::new(InMemoryBookingStore::new()));
        assert!(!cancel_tracking(&state, Uuid::new_v4()));
    }
}
