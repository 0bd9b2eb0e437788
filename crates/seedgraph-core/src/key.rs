//! Composite key tuples.

use crate::values::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An ordered, fixed-length sequence of scalar values acting as a primary
/// or foreign key.
///
/// Two tuples are equal iff all components are equal pairwise. Floats are
/// compared by bit pattern so that `Eq` and `Hash` agree.
#[derive(Debug, Clone, Default)]
pub struct KeyTuple(Vec<Value>);

impl KeyTuple {
    /// Create a key tuple from its components.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Create a single-component key.
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    /// Key components in order.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if every component is null or its type's zero value, i.e. the
    /// key has not been assigned yet.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Value::is_empty)
    }

    /// Check if any component is null.
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    /// Consume the tuple into its components.
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl PartialEq for KeyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a.key_eq(b))
    }
}

impl Eq for KeyTuple {}

impl Hash for KeyTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.key_hash(state);
        }
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl From<Vec<Value>> for KeyTuple {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}
