pub mod mpsc;
pub mod oneshot;
pub mod spin;
