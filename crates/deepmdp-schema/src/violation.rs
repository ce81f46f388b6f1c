//! Violation taxonomy and the fail-complete collector

use std::fmt::Write as _;

use serde::Serialize;
use thiserror::Error;

/// Category of a construction-time problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Missing, extra or mistyped key
    Schema,
    /// Numeric value outside its allowed domain
    Range,
    /// Cross-field invariant violated
    Consistency,
    /// Unrecognized member of a closed vocabulary
    UnknownEnum,
}

/// A single construction-time problem, located by its dotted document path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Missing, extra or mistyped key
    #[error("schema error at `{path}`: {message}")]
    Schema {
        /// Document path, e.g. `exp_config.q-net.encoder.strides[1]`
        path: String,
        /// Human readable description
        message: String,
    },

    /// Numeric value outside its allowed domain
    #[error("range error at `{path}`: {message}")]
    Range {
        /// Document path
        path: String,
        /// Human readable description
        message: String,
    },

    /// Cross-field invariant violated
    #[error("consistency error at `{path}`: {message}")]
    Consistency {
        /// Document path
        path: String,
        /// Human readable description
        message: String,
    },

    /// Unrecognized member of a closed vocabulary
    #[error("unknown value `{value}` at `{path}` (expected one of: {expected})")]
    UnknownEnum {
        /// Document path
        path: String,
        /// The offending identifier
        value: String,
        /// Comma separated list of accepted identifiers
        expected: String,
    },
}

impl Violation {
    /// Category of this violation
    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::Schema { .. } => ViolationKind::Schema,
            Self::Range { .. } => ViolationKind::Range,
            Self::Consistency { .. } => ViolationKind::Consistency,
            Self::UnknownEnum { .. } => ViolationKind::UnknownEnum,
        }
    }

    /// Document path the violation is attached to
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Schema { path, .. }
            | Self::Range { path, .. }
            | Self::Consistency { path, .. }
            | Self::UnknownEnum { path, .. } => path,
        }
    }
}

/// Aggregate of every violation found while building a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid experiment configuration ({} problem(s)):{}", .violations.len(), render(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// All violations, in the order they were found
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations of a single kind
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind() == kind)
    }

    /// Whether any violation sits exactly at `path`
    #[must_use]
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path() == path)
    }

    /// Number of violations
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether the error holds no violation
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Consume the error into its violations
    #[must_use]
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl From<Violation> for ValidationError {
    fn from(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

fn render(violations: &[Violation]) -> String {
    let mut out = String::new();
    for v in violations {
        let _ = write!(out, "\n  - {v}");
    }
    out
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates violations so a single pass reports every problem
#[derive(Debug, Default)]
pub struct Collector {
    violations: Vec<Violation>,
}

impl Collector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Record several violations
    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    /// Record a schema violation
    pub fn schema(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(Violation::Schema {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Record a range violation
    pub fn range(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(Violation::Range {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Record a consistency violation
    pub fn consistency(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.push(Violation::Consistency {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Record an unrecognized identifier
    pub fn unknown_enum(&mut self, path: impl Into<String>, value: impl Into<String>, expected: &[&str]) {
        self.push(Violation::UnknownEnum {
            path: path.into(),
            value: value.into(),
            expected: expected.join(", "),
        });
    }

    /// Number of violations recorded so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok(())` when clean, otherwise the aggregate error
    ///
    /// # Errors
    ///
    /// Returns every recorded violation as one [`ValidationError`].
    pub fn finish(self) -> ValidationResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations,
            })
        }
    }
}
