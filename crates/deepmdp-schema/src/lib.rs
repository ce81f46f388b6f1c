//! Strict JSON document reading for DeepMDP experiment configs
//!
//! This crate provides the building blocks the config validator is written
//! with: a violation taxonomy, numeric and length constraints, and a strict
//! object reader that records every problem it meets instead of stopping at
//! the first one.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constraints;
pub mod reader;
pub mod violation;

pub use constraints::Constraint;
pub use reader::{choice, ObjectReader};
pub use violation::{Collector, ValidationError, ValidationResult, Violation, ViolationKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::constraints::*;
    pub use crate::{choice, Collector, ObjectReader, ValidationError, Violation, ViolationKind};
}
