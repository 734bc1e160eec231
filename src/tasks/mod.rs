//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache groups.

mod sweep;

pub use sweep::{spawn_expiry_sweep, DEFAULT_SWEEP_INTERVAL};
