//! Scalar type universe for seedgraph entities.
//!
//! This module defines `ValueType`, the set of scalar types a field can
//! carry. Reference and collection fields are not scalars and are modelled
//! by [`crate::schema::FieldKind`] instead.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Scalar data type of an entity field.
///
/// # YAML Format
///
/// Simple types can be specified as strings:
/// ```yaml
/// type: uuid
/// type: int
/// type: text
/// ```
///
/// Enumerations use the object format:
/// ```yaml
/// type:
///   type: enum
///   values: [draft, published]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Boolean value
    Bool,

    /// 8-bit signed integer
    Int8,

    /// 16-bit signed integer
    Int16,

    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// 8-bit unsigned integer
    UInt8,

    /// 16-bit unsigned integer
    UInt16,

    /// 32-bit unsigned integer
    UInt32,

    /// 64-bit unsigned integer
    UInt64,

    /// 32-bit IEEE 754 floating point
    Float32,

    /// 64-bit IEEE 754 floating point
    Float64,

    /// Exact fixed-point decimal
    Decimal,

    /// Unlimited text
    Text,

    /// UUID (128-bit)
    Uuid,

    /// Enumeration with its declared members
    Enum {
        /// Allowed values, in declaration order
        values: Vec<String>,
    },

    /// Timestamp in UTC
    DateTime,

    /// Timestamp with a fixed UTC offset
    DateTimeOffset,

    /// Opaque binary data
    Bytes,
}

impl ValueType {
    /// Create a new Enum type with the given members.
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if this type is a signed or unsigned integer.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Check if this type represents a numeric type.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::Float32 | Self::Float64 | Self::Decimal)
    }

    /// Check if this type represents a temporal type.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::DateTime | Self::DateTimeOffset)
    }

    /// The short name used in YAML for simple types.
    fn simple_name(&self) -> Option<&'static str> {
        let name = match self {
            Self::Bool => "bool",
            Self::Int8 => "tiny_int",
            Self::Int16 => "small_int",
            Self::Int32 => "int",
            Self::Int64 => "big_int",
            Self::UInt8 => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Float32 => "float",
            Self::Float64 => "double",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::DateTime => "date_time",
            Self::DateTimeOffset => "date_time_offset",
            Self::Bytes => "bytes",
            Self::Enum { .. } => return None,
        };
        Some(name)
    }

    fn from_simple_name(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" | "boolean" => Self::Bool,
            "tiny_int" | "tinyint" | "i8" => Self::Int8,
            "small_int" | "smallint" | "i16" => Self::Int16,
            "int" | "i32" => Self::Int32,
            "big_int" | "bigint" | "i64" => Self::Int64,
            "u8" => Self::UInt8,
            "u16" => Self::UInt16,
            "u32" => Self::UInt32,
            "u64" => Self::UInt64,
            "float" | "f32" => Self::Float32,
            "double" | "f64" => Self::Float64,
            "decimal" => Self::Decimal,
            "text" | "string" => Self::Text,
            "uuid" => Self::Uuid,
            "date_time" | "datetime" => Self::DateTime,
            "date_time_offset" | "timestamp_tz" | "timestamptz" => Self::DateTimeOffset,
            "bytes" => Self::Bytes,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum { values } => write!(f, "enum({})", values.join("|")),
            other => f.write_str(other.simple_name().unwrap_or("unknown")),
        }
    }
}

// Simple types serialize as a string ("uuid", "int"), enums as a map
// ({"type": "enum", "values": [...]}).

impl Serialize for ValueType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Self::Enum { values } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "enum")?;
                map.serialize_entry("values", values)?;
                map.end()
            }
            other => serializer.serialize_str(other.simple_name().unwrap_or("unknown")),
        }
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, Visitor};

        struct ValueTypeVisitor;

        impl<'de> Visitor<'de> for ValueTypeVisitor {
            type Value = ValueType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or map representing a ValueType")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                ValueType::from_simple_name(value)
                    .ok_or_else(|| E::custom(format!("unknown simple type: {value}")))
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut type_name: Option<String> = None;
                let mut fields: HashMap<String, serde_yaml::Value> = HashMap::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "type" {
                        type_name = Some(map.next_value()?);
                    } else {
                        fields.insert(key, map.next_value()?);
                    }
                }

                let type_name = type_name.ok_or_else(|| M::Error::missing_field("type"))?;

                match type_name.as_str() {
                    "enum" => {
                        let value = fields
                            .get("values")
                            .ok_or_else(|| M::Error::missing_field("values"))?;
                        let values: Vec<String> = serde_yaml::from_value(value.clone())
                            .map_err(|e| M::Error::custom(format!("invalid field 'values': {e}")))?;
                        Ok(ValueType::Enum { values })
                    }
                    other => ValueType::from_simple_name(other)
                        .ok_or_else(|| M::Error::custom(format!("unknown type: {other}"))),
                }
            }
        }

        deserializer.deserialize_any(ValueTypeVisitor)
    }
}
