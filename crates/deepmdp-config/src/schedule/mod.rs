//! Deterministic schedules derived from a validated experiment
//!
//! Everything here is a pure function of the configuration and the index it
//! is queried with, so the same schedule can be shared between sampler
//! workers without coordination.

pub mod cadence;
pub mod epsilon;
pub mod snapshot;

pub use cadence::TrainingCadence;
pub use epsilon::{DecayUnit, EpsilonBounds, EpsilonDecay, EpsilonSchedule, EpsilonTracker};
pub use snapshot::{SnapshotConfig, SnapshotMode};

/// Trait for schedules (e.g., for epsilon decay)
pub trait Schedule: Send + Sync {
    /// Get value at step t
    fn value(&self, t: usize) -> f64;
}
