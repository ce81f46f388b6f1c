//! Constraint definitions for field validation

use serde::Serialize;
use serde_json::Value;

use crate::ViolationKind;

/// Constraints that can be applied to document fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Constraint {
    /// Numeric value strictly above the bound
    GreaterThan(f64),

    /// Numeric value at or above the bound
    Min(f64),

    /// Numeric value at or below the bound
    Max(f64),

    /// Minimum string or array length
    MinLength(usize),

    /// Exact array length
    Length(usize),
}

impl Constraint {
    /// Which violation category a failure of this constraint belongs to
    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::GreaterThan(_) | Self::Min(_) | Self::Max(_) => ViolationKind::Range,
            Self::MinLength(_) | Self::Length(_) => ViolationKind::Schema,
        }
    }

    /// Validate a value against this constraint
    ///
    /// Constraints that do not apply to the value's JSON type pass.
    ///
    /// # Errors
    ///
    /// Returns a human readable description of the failed constraint.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::GreaterThan(bound), Value::Number(n)) => match n.as_f64() {
                Some(v) if v > *bound => Ok(()),
                _ => Err(format!("must be > {bound}, got {n}")),
            },
            (Self::Min(bound), Value::Number(n)) => match n.as_f64() {
                Some(v) if v >= *bound => Ok(()),
                _ => Err(format!("must be >= {bound}, got {n}")),
            },
            (Self::Max(bound), Value::Number(n)) => match n.as_f64() {
                Some(v) if v <= *bound => Ok(()),
                _ => Err(format!("must be <= {bound}, got {n}")),
            },
            (Self::MinLength(min), Value::String(s)) if s.chars().count() < *min => {
                Err(format!("length must be at least {min}"))
            }
            (Self::MinLength(min), Value::Array(items)) if items.len() < *min => {
                Err(format!("must have at least {min} entries, got {}", items.len()))
            }
            (Self::Length(len), Value::Array(items)) if items.len() != *len => {
                Err(format!("must have exactly {len} entries, got {}", items.len()))
            }
            _ => Ok(()),
        }
    }
}

/// Strictly positive number
#[must_use]
pub fn positive() -> Constraint {
    Constraint::GreaterThan(0.0)
}

/// Zero or above
#[must_use]
pub fn non_negative() -> Constraint {
    Constraint::Min(0.0)
}

/// At most `value`
#[must_use]
pub fn max(value: f64) -> Constraint {
    Constraint::Max(value)
}

/// Non-empty string or array of at least `len` entries
#[must_use]
pub fn min_length(len: usize) -> Constraint {
    Constraint::MinLength(len)
}

/// Array of exactly `len` entries
#[must_use]
pub fn length(len: usize) -> Constraint {
    Constraint::Length(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_bounds() {
        assert!(positive().validate(&json!(0.0001)).is_ok());
        assert!(positive().validate(&json!(0)).is_err());
        assert!(non_negative().validate(&json!(0)).is_ok());
        assert!(non_negative().validate(&json!(-1)).is_err());
        assert!(max(1.0).validate(&json!(1.0)).is_ok());
        assert!(max(1.0).validate(&json!(1.5)).is_err());
    }

    #[test]
    fn test_lengths() {
        assert!(length(3).validate(&json!([4, 84, 84])).is_ok());
        assert_eq!(
            length(3).validate(&json!([84, 84])).unwrap_err(),
            "must have exactly 3 entries, got 2"
        );
        assert!(min_length(1).validate(&json!("")).is_err());
        assert!(min_length(1).validate(&json!("LunarLander")).is_ok());
    }

    #[test]
    fn test_inapplicable_constraint_passes() {
        assert!(positive().validate(&json!("text")).is_ok());
        assert!(length(2).validate(&json!(7)).is_ok());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(positive().kind(), ViolationKind::Range);
        assert_eq!(length(3).kind(), ViolationKind::Schema);
    }
}
