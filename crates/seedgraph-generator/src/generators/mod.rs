//! Individual value generators for the scalar type universe.
//!
//! Each submodule covers one family of types. [`generate_value`] dispatches
//! on a [`ValueType`] and is the single entry point used by
//! [`crate::ValueSynthesizer`].

pub mod enumeration;
pub mod nullable;
pub mod numeric;
pub mod text;
pub mod timestamp;
pub mod uuid;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use seedgraph_core::{Value, ValueType};
use std::sync::Arc;

/// A parameterless value producer. The `&str` argument is a name hint
/// (usually the field name) used by text generation.
pub type ValueCreator = Arc<dyn Fn(&mut StdRng, &str) -> Value + Send + Sync>;

/// Check whether [`generate_value`] has a default generator for a type.
pub fn is_supported(value_type: &ValueType) -> bool {
    match value_type {
        ValueType::Bytes => false,
        ValueType::Enum { values } => !values.is_empty(),
        _ => true,
    }
}

/// Generate a random value of the given type.
///
/// Returns `None` for types without a default generator (see
/// [`is_supported`]).
pub fn generate_value<R: Rng>(
    value_type: &ValueType,
    rng: &mut R,
    hint: &str,
    now: DateTime<Utc>,
) -> Option<Value> {
    let value = match value_type {
        ValueType::Bool => numeric::generate_bool(rng),

        ValueType::Int8
        | ValueType::Int16
        | ValueType::Int32
        | ValueType::Int64
        | ValueType::UInt8
        | ValueType::UInt16
        | ValueType::UInt32
        | ValueType::UInt64 => numeric::generate_positive_int(rng, value_type)?,

        ValueType::Float32 => numeric::generate_float32(rng),
        ValueType::Float64 => numeric::generate_float64(rng),
        ValueType::Decimal => numeric::generate_decimal(rng),

        ValueType::Text => text::generate_text(rng, hint),
        ValueType::Uuid => uuid::generate_uuid_v4(rng),
        ValueType::Enum { values } => enumeration::generate_enum_member(rng, values)?,

        ValueType::DateTime => timestamp::generate_date_time(rng, now),
        ValueType::DateTimeOffset => timestamp::generate_date_time_offset(rng, now),

        // No sensible default; callers must register a custom creator
        ValueType::Bytes => return None,
    };
    Some(value)
}
