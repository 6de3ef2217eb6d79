use std::time::Duration;

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::tracking::TrackingSession;
use crate::models::tracking::TrackingState;
use crate::observability::metrics::Metrics;

/// Publishing side of one session's states: every update on the broadcast
/// channel, the most recent one on the watch channel. Owned by the session
/// task, so observers see the channels close once the task ends or is aborted.
pub struct TrackingFeed {
    updates: broadcast::Sender<TrackingState>,
    latest: watch::Sender<TrackingState>,
}

impl TrackingFeed {
    pub fn channel(initial: TrackingState, buffer_size: usize) -> (Self, TrackingObserver) {
        let (updates, updates_rx) = broadcast::channel(buffer_size.max(1));
        let (latest, latest_rx) = watch::channel(initial);
        let observer = TrackingObserver {
            updates: updates_rx,
            latest: latest_rx,
        };
        (Self { updates, latest }, observer)
    }

    pub fn publish(&self, state: TrackingState) {
        self.latest.send_replace(state.clone());
        let _ = self.updates.send(state);
    }
}

/// Read side of a session. Keeps answering `latest` after the session stops.
pub struct TrackingObserver {
    updates: broadcast::Receiver<TrackingState>,
    latest: watch::Receiver<TrackingState>,
}

impl TrackingObserver {
    pub fn latest(&self) -> TrackingState {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingState> {
        self.updates.resubscribe()
    }

    /// The current state followed by every later one. Subscribes before
    /// reading the snapshot so no update falls between the two. Ends after
    /// `Arrived`, or when the session is cancelled.
    pub fn follow(&self) -> impl Stream<Item = TrackingState> + Send + 'static + use<> {
        let rx = self.subscribe();
        let snapshot = self.latest();
        let seen = snapshot.clone();

        let later = received(rx).skip_while(move |state| future::ready(*state == seen));
        until_arrived(stream::once(future::ready(snapshot)).chain(later))
    }
}

/// Finite stream of updates that ends right after the `Arrived` state.
/// Lagged receivers skip what they missed.
pub fn tracking_updates(
    rx: broadcast::Receiver<TrackingState>,
) -> impl Stream<Item = TrackingState> + Send + 'static {
    until_arrived(received(rx))
}

fn received(
    rx: broadcast::Receiver<TrackingState>,
) -> impl Stream<Item = TrackingState> + Send + 'static {
    BroadcastStream::new(rx).filter_map(|result| {
        future::ready(match result {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(error = %err, "tracking subscriber lagged");
                None
            }
        })
    })
}

fn until_arrived<S>(states: S) -> impl Stream<Item = TrackingState> + Send + 'static
where
    S: Stream<Item = TrackingState> + Send + 'static,
{
    states.scan(false, |finished, state| {
        if *finished {
            return future::ready(None);
        }
        *finished = state.has_arrived();
        future::ready(Some(state))
    })
}

#[derive(Debug, Clone)]
pub struct TrackingScheduler {
    tick_interval: Duration,
    sim_seconds_per_tick: f64,
}

impl TrackingScheduler {
    pub fn new(tick_interval: Duration, sim_seconds_per_tick: f64) -> Self {
        Self {
            tick_interval,
            sim_seconds_per_tick,
        }
    }

    /// Publishes the starting state, then ticks the session on every interval
    /// until it arrives. The returned handle owns the task.
    pub fn spawn(
        &self,
        booking_id: Uuid,
        session: TrackingSession,
        feed: TrackingFeed,
        metrics: Metrics,
    ) -> TrackingHandle {
        let task = tokio::spawn(run_session(
            booking_id,
            session,
            feed,
            metrics,
            self.tick_interval,
            self.sim_seconds_per_tick,
        ));

        TrackingHandle { task }
    }
}

pub struct TrackingHandle {
    task: JoinHandle<TrackingState>,
}

impl TrackingHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Lets the session be cancelled by whoever does not own the handle.
    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    /// Final state, or `None` if the session was cancelled.
    pub async fn join(self) -> Option<TrackingState> {
        self.task.await.ok()
    }
}

struct ActiveSessionGuard(Metrics);

impl ActiveSessionGuard {
    fn new(metrics: Metrics) -> Self {
        metrics.tracking_sessions_active.inc();
        Self(metrics)
    }
}

impl Drop for ActiveSessionGuard {
    fn drop(&mut self) {
        self.0.tracking_sessions_active.dec();
    }
}

async fn run_session(
    booking_id: Uuid,
    mut session: TrackingSession,
    feed: TrackingFeed,
    metrics: Metrics,
    tick_interval: Duration,
    sim_seconds_per_tick: f64,
) -> TrackingState {
    let _active = ActiveSessionGuard::new(metrics.clone());

    info!(
        %booking_id,
        eta_minutes = session.state().eta_minutes,
        speed_km_per_sec = session.speed_km_per_sec(),
        "tracking started"
    );
    feed.publish(session.state().clone());

    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    while !session.state().has_arrived() {
        ticker.tick().await;

        match session.tick(sim_seconds_per_tick) {
            Ok(state) => {
                metrics
                    .tracking_ticks_total
                    .with_label_values(&["ok"])
                    .inc();
                debug!(
                    %booking_id,
                    phase = ?state.phase,
                    remaining_km = state.remaining_distance_km,
                    eta_minutes = state.eta_minutes,
                    "tracking tick"
                );
                feed.publish(state.clone());
            }
            Err(fault) => {
                metrics
                    .tracking_ticks_total
                    .with_label_values(&["fault"])
                    .inc();
                warn!(%booking_id, error = %fault, "tracking tick skipped");
            }
        }
    }

    info!(%booking_id, "provider arrived at drop-off");
    session.into_state()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use futures::StreamExt;

    use super::{tracking_updates, TrackingFeed, TrackingScheduler};
    use crate::engine::tracking::TrackingSession;
    use crate::geo;
    use crate::models::coordinate::Coordinate;
    use crate::models::provider::Provider;
    use crate::models::tracking::TrackingPhase;
    use crate::models::trip::{AddressLabels, PlannedTrip, TripRequest};
    use crate::observability::metrics::Metrics;

    fn session() -> TrackingSession {
        let pickup = Coordinate {
            latitude: 19.0760,
            longitude: 72.8777,
        };
        let trip = PlannedTrip::plan(TripRequest {
            pickup,
            dropoff: geo::project(&pickup, 60.0, 0.5),
            labels: AddressLabels::default(),
            bag_count: 1,
            bag_types: BTreeSet::from(["Duffel".to_string()]),
            note: None,
        });
        let lead = Provider {
            id: 4321,
            name: "Ravi Tiwari".to_string(),
            rating: 4.7,
            completed_jobs: 80,
            initial_distance_km: 0.6,
            eta_minutes: 6,
            is_lead: true,
        };
        TrackingSession::start_with_bearing(&trip, &lead, 135.0)
    }

    #[tokio::test]
    async fn publishes_every_state_until_arrival() {
        let session = session();
        let (feed, observer) = TrackingFeed::channel(session.state().clone(), 256);
        let updates = tracking_updates(observer.subscribe());
        let metrics = Metrics::new();

        let handle = TrackingScheduler::new(Duration::from_millis(1), 60.0).spawn(
            uuid::Uuid::new_v4(),
            session,
            feed,
            metrics.clone(),
        );

        let states: Vec<_> = updates.collect().await;
        let final_state = handle.join().await.unwrap();

        assert_eq!(states.first().unwrap().phase, TrackingPhase::EnRouteToPickup);
        assert_eq!(states.last().unwrap(), &final_state);
        assert!(final_state.has_arrived());
        assert_eq!(
            states.iter().filter(|s| s.has_arrived()).count(),
            1,
            "stream ends at the first arrived state"
        );
        assert_eq!(observer.latest(), final_state);
        assert_eq!(metrics.tracking_sessions_active.get(), 0);
    }

    #[tokio::test]
    async fn cancelled_session_stops_publishing() {
        let session = session();
        let (feed, observer) = TrackingFeed::channel(session.state().clone(), 256);
        let metrics = Metrics::new();

        let handle = TrackingScheduler::new(Duration::from_secs(3600), 1.0).spawn(
            uuid::Uuid::new_v4(),
            session,
            feed,
            metrics.clone(),
        );
        handle.cancel();

        assert!(handle.join().await.is_none());
        assert_eq!(observer.latest().phase, TrackingPhase::EnRouteToPickup);
        assert_eq!(metrics.tracking_sessions_active.get(), 0);
    }

    #[tokio::test]
    async fn follower_stream_ends_when_session_is_cancelled() {
        let session = session();
        let (feed, observer) = TrackingFeed::channel(session.state().clone(), 256);
        let follower = observer.follow();

        let handle = TrackingScheduler::new(Duration::from_secs(3600), 1.0).spawn(
            uuid::Uuid::new_v4(),
            session,
            feed,
            Metrics::new(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort_handle().abort();

        let states = tokio::time::timeout(Duration::from_secs(2), follower.collect::<Vec<_>>())
            .await
            .expect("stream closes once the session task is gone");

        assert_eq!(states.len(), 1);
        assert_eq!(states[0].phase, TrackingPhase::EnRouteToPickup);
        assert!(handle.join().await.is_none());
    }

    #[tokio::test]
    async fn late_follower_sees_snapshot_then_every_later_state() {
        let session = session();
        let initial = session.state().clone();
        let (feed, observer) = TrackingFeed::channel(initial.clone(), 256);

        let mut moved = initial.clone();
        moved.remaining_distance_km -= 0.1;
        feed.publish(moved.clone());

        let follower = observer.follow();

        let mut arrived = moved.clone();
        arrived.phase = TrackingPhase::Arrived;
        arrived.remaining_distance_km = 0.0;
        feed.publish(arrived.clone());
        drop(feed);

        let states: Vec<_> = follower.collect().await;
        assert_eq!(states, vec![moved, arrived]);
    }

    #[tokio::test]
    async fn follower_of_finished_session_gets_final_state_only() {
        let session = session();
        let (feed, observer) = TrackingFeed::channel(session.state().clone(), 256);

        let mut arrived = session.state().clone();
        arrived.phase = TrackingPhase::Arrived;
        feed.publish(arrived.clone());
        drop(feed);

        let states: Vec<_> = observer.follow().collect().await;
        assert_eq!(states, vec![arrived]);
    }
}
