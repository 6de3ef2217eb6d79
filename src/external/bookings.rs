//! Booking persistence boundary.

use chrono::Utc;
use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::booking::{BookingRecord, NewBooking};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("booking store unavailable: {0}")]
    Unavailable(String),
}

pub trait BookingStore: Send + Sync {
    /// Persists the booking and returns its identifier.
    fn create(&self, booking: NewBooking) -> BoxFuture<'_, Result<Uuid, StoreError>>;

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<Option<BookingRecord>, StoreError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    records: DashMap<Uuid, BookingRecord>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn create(&self, booking: NewBooking) -> BoxFuture<'_, Result<Uuid, StoreError>> {
        let record = BookingRecord {
            id: Uuid::new_v4(),
            trip: booking.trip,
            estimated_fare: booking.estimated_fare,
            status: booking.status,
            created_at: Utc::now(),
        };
        let id = record.id;
        self.records.insert(id, record);

        future::ready(Ok(id)).boxed()
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Result<Option<BookingRecord>, StoreError>> {
        let record = self.records.get(&id).map(|entry| entry.value().clone());
        future::ready(Ok(record)).boxed()
    }
}
