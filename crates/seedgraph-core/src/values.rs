//! Dynamic scalar values carried by entity fields.

use crate::types::ValueType;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A scalar field value.
///
/// Each variant corresponds to one [`ValueType`]; `Null` stands for an
/// absent value in a nullable field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer
    Int8(i8),

    /// 16-bit signed integer
    Int16(i16),

    /// 32-bit signed integer
    Int32(i32),

    /// 64-bit signed integer
    Int64(i64),

    /// 8-bit unsigned integer
    UInt8(u8),

    /// 16-bit unsigned integer
    UInt16(u16),

    /// 32-bit unsigned integer
    UInt32(u32),

    /// 64-bit unsigned integer
    UInt64(u64),

    /// 32-bit floating point
    Float32(f32),

    /// 64-bit floating point
    Float64(f64),

    /// Exact decimal
    Decimal(Decimal),

    /// Text value
    Text(String),

    /// UUID value
    Uuid(Uuid),

    /// Member of an enumeration
    Enum(String),

    /// Timestamp in UTC
    DateTime(DateTime<Utc>),

    /// Timestamp with a fixed offset
    DateTimeOffset(DateTime<FixedOffset>),

    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// The zero value of a type, used for required fields that have not
    /// been assigned yet.
    pub fn default_for(value_type: &ValueType) -> Self {
        match value_type {
            ValueType::Bool => Self::Bool(false),
            ValueType::Int8 => Self::Int8(0),
            ValueType::Int16 => Self::Int16(0),
            ValueType::Int32 => Self::Int32(0),
            ValueType::Int64 => Self::Int64(0),
            ValueType::UInt8 => Self::UInt8(0),
            ValueType::UInt16 => Self::UInt16(0),
            ValueType::UInt32 => Self::UInt32(0),
            ValueType::UInt64 => Self::UInt64(0),
            ValueType::Float32 => Self::Float32(0.0),
            ValueType::Float64 => Self::Float64(0.0),
            ValueType::Decimal => Self::Decimal(Decimal::ZERO),
            ValueType::Text => Self::Text(String::new()),
            ValueType::Uuid => Self::Uuid(Uuid::nil()),
            ValueType::Enum { values } => values
                .first()
                .map_or(Self::Null, |first| Self::Enum(first.clone())),
            ValueType::DateTime => Self::DateTime(DateTime::<Utc>::UNIX_EPOCH),
            ValueType::DateTimeOffset => {
                Self::DateTimeOffset(DateTime::<Utc>::UNIX_EPOCH.fixed_offset())
            }
            ValueType::Bytes => Self::Bytes(Vec::new()),
        }
    }

    /// Build an integer value of the given type from a sequence number.
    ///
    /// Returns `None` when the type is not an integer or the number does not
    /// fit.
    pub fn from_sequence(value_type: &ValueType, n: u64) -> Option<Self> {
        let value = match value_type {
            ValueType::Int8 => Self::Int8(i8::try_from(n).ok()?),
            ValueType::Int16 => Self::Int16(i16::try_from(n).ok()?),
            ValueType::Int32 => Self::Int32(i32::try_from(n).ok()?),
            ValueType::Int64 => Self::Int64(i64::try_from(n).ok()?),
            ValueType::UInt8 => Self::UInt8(u8::try_from(n).ok()?),
            ValueType::UInt16 => Self::UInt16(u16::try_from(n).ok()?),
            ValueType::UInt32 => Self::UInt32(u32::try_from(n).ok()?),
            ValueType::UInt64 => Self::UInt64(n),
            _ => return None,
        };
        Some(value)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is null or the zero value of its type.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int8(v) => *v == 0,
            Self::Int16(v) => *v == 0,
            Self::Int32(v) => *v == 0,
            Self::Int64(v) => *v == 0,
            Self::UInt8(v) => *v == 0,
            Self::UInt16(v) => *v == 0,
            Self::UInt32(v) => *v == 0,
            Self::UInt64(v) => *v == 0,
            Self::Float32(v) => *v == 0.0,
            Self::Float64(v) => *v == 0.0,
            Self::Decimal(d) => d.is_zero(),
            Self::Text(s) | Self::Enum(s) => s.is_empty(),
            Self::Uuid(u) => u.is_nil(),
            Self::DateTime(dt) => *dt == DateTime::<Utc>::UNIX_EPOCH,
            Self::DateTimeOffset(dt) => dt.timestamp() == 0 && dt.timestamp_subsec_nanos() == 0,
            Self::Bytes(b) => b.is_empty(),
        }
    }

    /// Check whether the value may be stored in a field of the given type.
    pub fn conforms_to(&self, value_type: &ValueType, nullable: bool) -> bool {
        match (self, value_type) {
            (Self::Null, _) => nullable,
            (Self::Enum(member), ValueType::Enum { values }) => values.contains(member),
            (Self::Bool(_), ValueType::Bool)
            | (Self::Int8(_), ValueType::Int8)
            | (Self::Int16(_), ValueType::Int16)
            | (Self::Int32(_), ValueType::Int32)
            | (Self::Int64(_), ValueType::Int64)
            | (Self::UInt8(_), ValueType::UInt8)
            | (Self::UInt16(_), ValueType::UInt16)
            | (Self::UInt32(_), ValueType::UInt32)
            | (Self::UInt64(_), ValueType::UInt64)
            | (Self::Float32(_), ValueType::Float32)
            | (Self::Float64(_), ValueType::Float64)
            | (Self::Decimal(_), ValueType::Decimal)
            | (Self::Text(_), ValueType::Text)
            | (Self::Uuid(_), ValueType::Uuid)
            | (Self::DateTime(_), ValueType::DateTime)
            | (Self::DateTimeOffset(_), ValueType::DateTimeOffset)
            | (Self::Bytes(_), ValueType::Bytes) => true,
            _ => false,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::UInt8(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a UUID.
    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Equality used for key comparison: floats compare by bit pattern so
    /// that it agrees with [`Value::key_hash`].
    pub fn key_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }

    /// Hash consistent with [`Value::key_eq`].
    pub fn key_hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int8(v) => v.hash(state),
            Self::Int16(v) => v.hash(state),
            Self::Int32(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::UInt8(v) => v.hash(state),
            Self::UInt16(v) => v.hash(state),
            Self::UInt32(v) => v.hash(state),
            Self::UInt64(v) => v.hash(state),
            Self::Float32(v) => v.to_bits().hash(state),
            Self::Float64(v) => v.to_bits().hash(state),
            Self::Decimal(d) => d.hash(state),
            Self::Text(s) | Self::Enum(s) => s.hash(state),
            Self::Uuid(u) => u.hash(state),
            Self::DateTime(dt) => dt.hash(state),
            Self::DateTimeOffset(dt) => dt.hash(state),
            Self::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Enum(s) => f.write_str(s),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
