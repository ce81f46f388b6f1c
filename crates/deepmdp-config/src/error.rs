//! Error types for loading documents and querying schedules

use std::path::PathBuf;

use thiserror::Error;

use deepmdp_schema::ValidationError;

/// Failure to turn a file or string into an [`Experiment`](crate::Experiment)
#[derive(Error, Debug)]
pub enum LoadError {
    /// The document could not be read
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed JSON, or has trailing data
    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is JSON but violates the experiment schema
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A schedule was queried with arguments outside its domain
///
/// These indicate a bug in the caller's bookkeeping rather than in the
/// configuration, so they are returned immediately instead of aggregated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// `total_epochs` was zero
    #[error("total_epochs must be > 0")]
    NoEpochs,

    /// Initial epsilon outside (0, 1]
    #[error("initial epsilon must be in (0, 1], got {0}")]
    InitialEpsilon(f64),

    /// Epsilon floor outside [0, initial]
    #[error("epsilon floor must be in [0, {initial}], got {floor}")]
    EpsilonFloor {
        /// Requested floor
        floor: f64,
        /// Initial epsilon it was checked against
        initial: f64,
    },

    /// Neither the document nor the caller supplied an initial epsilon
    #[error("initial epsilon is not set in the document and was not supplied by the caller")]
    MissingInitialEpsilon,

    /// Both the document and the caller supplied epsilon bounds
    #[error("epsilon bounds are set in the document and were also supplied by the caller")]
    ConflictingEpsilonBounds,
}
