//! Strict, fail-complete reading of JSON objects
//!
//! An [`ObjectReader`] wraps one JSON object. Every field read through it is
//! marked as known; [`ObjectReader::finish`] reports whatever is left over as
//! an unknown key. Readers never stop at the first problem: each failed read
//! records a [`Violation`](crate::Violation) in the shared [`Collector`] and
//! yields `None`, so callers keep going and the user sees every problem in
//! one pass.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::{Collector, Constraint, ViolationKind};

/// Join an object path and a key into a dotted document path
#[must_use]
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

/// Path of the `index`-th element of the array at `parent`
#[must_use]
pub fn index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "<document>"
    } else {
        path
    }
}

fn check(value: &Value, path: &str, constraints: &[Constraint], out: &mut Collector) -> bool {
    let mut ok = true;
    for constraint in constraints {
        if let Err(message) = constraint.validate(value) {
            ok = false;
            match constraint.kind() {
                ViolationKind::Range => out.range(path, message),
                _ => out.schema(path, message),
            }
        }
    }
    ok
}

/// Read a non-negative JSON integer; floats such as `10.0` are rejected
pub fn as_integer(value: &Value, path: &str, constraints: &[Constraint], out: &mut Collector) -> Option<usize> {
    let Value::Number(n) = value else {
        out.schema(path, format!("expected integer, got {}", type_name(value)));
        return None;
    };
    if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
        // integer literals beyond u64 arrive as floats
        #[allow(clippy::cast_precision_loss)]
        let limit = u64::MAX as f64;
        if f.fract() == 0.0 && f.abs() >= limit {
            out.range(path, format!("integer {n} is out of range"));
        } else {
            out.schema(path, format!("expected integer, got float {n}"));
        }
        return None;
    }
    if !check(value, path, constraints, out) {
        return None;
    }
    if let Some(v) = n.as_u64().and_then(|v| usize::try_from(v).ok()) {
        Some(v)
    } else {
        out.range(path, format!("must be a non-negative count, got {n}"));
        None
    }
}

/// Read any JSON number as `f64`
pub fn as_float(value: &Value, path: &str, constraints: &[Constraint], out: &mut Collector) -> Option<f64> {
    let Some(v) = value.as_f64() else {
        out.schema(path, format!("expected number, got {}", type_name(value)));
        return None;
    };
    check(value, path, constraints, out).then_some(v)
}

/// Read a literal JSON boolean; truthy numbers are rejected
pub fn as_bool(value: &Value, path: &str, out: &mut Collector) -> Option<bool> {
    if let Value::Bool(b) = value {
        Some(*b)
    } else {
        out.schema(path, format!("expected boolean, got {}", type_name(value)));
        None
    }
}

/// Read a JSON string
pub fn as_str<'v>(value: &'v Value, path: &str, constraints: &[Constraint], out: &mut Collector) -> Option<&'v str> {
    let Value::String(s) = value else {
        out.schema(path, format!("expected string, got {}", type_name(value)));
        return None;
    };
    check(value, path, constraints, out).then_some(s.as_str())
}

/// Resolve `value` against a closed vocabulary
///
/// Unrecognized identifiers are recorded as
/// [`Violation::UnknownEnum`](crate::Violation::UnknownEnum).
pub fn choice<T: Copy>(value: &str, path: &str, variants: &[(&str, T)], out: &mut Collector) -> Option<T> {
    if let Some((_, v)) = variants.iter().find(|(name, _)| *name == value) {
        return Some(*v);
    }
    let names: Vec<&str> = variants.iter().map(|(name, _)| *name).collect();
    out.unknown_enum(path, value, &names);
    None
}

/// Strict reader over one JSON object
#[derive(Debug)]
pub struct ObjectReader<'a> {
    path: String,
    map: &'a Map<String, Value>,
    known: BTreeSet<String>,
}

impl<'a> ObjectReader<'a> {
    /// Open the document root
    pub fn root(value: &'a Value, out: &mut Collector) -> Option<Self> {
        Self::open(value, String::new(), out)
    }

    /// Open `value` as an object located at `path`
    pub fn open(value: &'a Value, path: impl Into<String>, out: &mut Collector) -> Option<Self> {
        let path = path.into();
        if let Value::Object(map) = value {
            Some(Self {
                path,
                map,
                known: BTreeSet::new(),
            })
        } else {
            out.schema(display(&path), format!("expected object, got {}", type_name(value)));
            None
        }
    }

    /// Path of this object
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of one of this object's fields
    #[must_use]
    pub fn field_path(&self, key: &str) -> String {
        join(&self.path, key)
    }

    /// Raw value of a required field
    pub fn required(&mut self, key: &str, out: &mut Collector) -> Option<&'a Value> {
        self.known.insert(key.to_owned());
        let value = self.map.get(key);
        if value.is_none() {
            out.schema(self.field_path(key), "missing required field");
        }
        value
    }

    /// Raw value of an optional field
    pub fn optional(&mut self, key: &str) -> Option<&'a Value> {
        self.known.insert(key.to_owned());
        self.map.get(key)
    }

    /// Required integer field
    pub fn integer(&mut self, key: &str, constraints: &[Constraint], out: &mut Collector) -> Option<usize> {
        let value = self.required(key, out)?;
        as_integer(value, &self.field_path(key), constraints, out)
    }

    /// Required numeric field
    pub fn float(&mut self, key: &str, constraints: &[Constraint], out: &mut Collector) -> Option<f64> {
        let value = self.required(key, out)?;
        as_float(value, &self.field_path(key), constraints, out)
    }

    /// Optional numeric field
    ///
    /// The outer `Option` is `None` when the field is present but invalid.
    pub fn optional_float(
        &mut self,
        key: &str,
        constraints: &[Constraint],
        out: &mut Collector,
    ) -> Option<Option<f64>> {
        match self.optional(key) {
            None => Some(None),
            Some(value) => as_float(value, &self.field_path(key), constraints, out).map(Some),
        }
    }

    /// Optional integer field, see [`Self::optional_float`]
    pub fn optional_integer(
        &mut self,
        key: &str,
        constraints: &[Constraint],
        out: &mut Collector,
    ) -> Option<Option<usize>> {
        match self.optional(key) {
            None => Some(None),
            Some(value) => as_integer(value, &self.field_path(key), constraints, out).map(Some),
        }
    }

    /// Required boolean field
    pub fn boolean(&mut self, key: &str, out: &mut Collector) -> Option<bool> {
        let value = self.required(key, out)?;
        as_bool(value, &self.field_path(key), out)
    }

    /// Required string field
    pub fn string(&mut self, key: &str, constraints: &[Constraint], out: &mut Collector) -> Option<&'a str> {
        let value = self.required(key, out)?;
        as_str(value, &self.field_path(key), constraints, out)
    }

    /// Required nested object
    pub fn object(&mut self, key: &str, out: &mut Collector) -> Option<ObjectReader<'a>> {
        let value = self.required(key, out)?;
        ObjectReader::open(value, self.field_path(key), out)
    }

    /// Required array, yielding each element with its document path
    pub fn elements(
        &mut self,
        key: &str,
        constraints: &[Constraint],
        out: &mut Collector,
    ) -> Option<Vec<(String, &'a Value)>> {
        let value = self.required(key, out)?;
        let path = self.field_path(key);
        let Value::Array(items) = value else {
            out.schema(path, format!("expected array, got {}", type_name(value)));
            return None;
        };
        if !check(value, &path, constraints, out) {
            return None;
        }
        Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (index(&path, i), item))
                .collect(),
        )
    }

    /// Required array of integers
    ///
    /// `array` constrains the array itself, `each` every element. All bad
    /// elements are reported before `None` is returned.
    pub fn integer_array(
        &mut self,
        key: &str,
        array: &[Constraint],
        each: &[Constraint],
        out: &mut Collector,
    ) -> Option<Vec<usize>> {
        let elements = self.elements(key, array, out)?;
        let before = out.len();
        let values: Vec<usize> = elements
            .iter()
            .filter_map(|(path, item)| as_integer(item, path, each, out))
            .collect();
        (out.len() == before).then_some(values)
    }

    /// Report every field that was never read as unknown
    pub fn finish(self, out: &mut Collector) {
        for key in self.map.keys() {
            if !self.known.contains(key) {
                out.schema(self.field_path(key), "unknown field");
            }
        }
    }
}
