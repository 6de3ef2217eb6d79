pub mod booking;
pub mod coordinate;
pub mod fare;
pub mod provider;
pub mod tracking;
pub mod trip;
