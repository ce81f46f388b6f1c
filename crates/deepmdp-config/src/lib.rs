//! Typed experiment configuration for DQN / DeepMDP training runs
//!
//! A run is described by one JSON document with two members,
//! `snapshot_config` and `exp_config`. This crate projects that document
//! into closed, immutable types, derives the Q-network layer plan from it,
//! and answers the scheduling questions a training loop asks at epoch and
//! step boundaries.
//!
//! ```no_run
//! use deepmdp_config::Experiment;
//!
//! let experiment = Experiment::from_path("configs/lunar_lander.json")?;
//! let total = experiment.config().n_epochs();
//! for epoch in 0..total {
//!     if experiment.snapshot().should_snapshot(epoch, total)? {
//!         // persist a checkpoint
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod architecture;
pub mod env;
pub mod error;
pub mod experiment;
pub mod loss;
pub mod network;
pub mod plots;
pub mod schedule;

// Re-export core types
pub use architecture::{describe, ImageShape, LayerPlan, LayerSpec, Stage};
pub use env::EnvSpec;
pub use error::{DomainError, LoadError};
pub use experiment::{validate, Experiment, ExperimentConfig};
pub use loss::{DeepMdpSpec, LossTerms, LossWeights};
pub use network::{EncoderSpec, HeadSpec, QNetSpec};
pub use plots::{PlotKind, PlotSet};
pub use schedule::{
    DecayUnit, EpsilonBounds, EpsilonDecay, EpsilonSchedule, EpsilonTracker, Schedule, SnapshotConfig,
    SnapshotMode, TrainingCadence,
};

pub use deepmdp_schema::{ValidationError, Violation, ViolationKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DomainError, EpsilonDecay, Experiment, ExperimentConfig, LayerPlan, LoadError, Schedule,
        SnapshotConfig, TrainingCadence, ValidationError,
    };
}
