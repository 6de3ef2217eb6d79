pub mod assignment;
pub mod dispatch;
pub mod fare;
pub mod rng;
pub mod scheduler;
pub mod tracking;
