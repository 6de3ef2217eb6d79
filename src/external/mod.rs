pub mod bookings;
pub mod geocode;
