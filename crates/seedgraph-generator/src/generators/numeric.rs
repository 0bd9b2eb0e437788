//! Numeric value generators.
//!
//! Integers are drawn from `1..=MAX` of their width so that generated keys
//! are never the zero value a store treats as "unassigned".

use rand::Rng;
use rust_decimal::Decimal;
use seedgraph_core::{Value, ValueType};

/// Bound on the magnitude of generated floats.
const FLOAT_RANGE: f64 = 1_000_000.0;

/// Bound on the mantissa of generated decimals (scale 2).
const DECIMAL_MANTISSA: i64 = 100_000_000;

/// Generate a random boolean.
pub fn generate_bool<R: Rng>(rng: &mut R) -> Value {
    Value::Bool(rng.random_bool(0.5))
}

/// Generate a positive integer of the given integer type.
///
/// Returns `None` if `value_type` is not an integer type.
pub fn generate_positive_int<R: Rng>(rng: &mut R, value_type: &ValueType) -> Option<Value> {
    let value = match value_type {
        ValueType::Int8 => Value::Int8(rng.random_range(1..=i8::MAX)),
        ValueType::Int16 => Value::Int16(rng.random_range(1..=i16::MAX)),
        ValueType::Int32 => Value::Int32(rng.random_range(1..=i32::MAX)),
        ValueType::Int64 => Value::Int64(rng.random_range(1..=i64::MAX)),
        ValueType::UInt8 => Value::UInt8(rng.random_range(1..=u8::MAX)),
        ValueType::UInt16 => Value::UInt16(rng.random_range(1..=u16::MAX)),
        ValueType::UInt32 => Value::UInt32(rng.random_range(1..=u32::MAX)),
        ValueType::UInt64 => Value::UInt64(rng.random_range(1..=u64::MAX)),
        _ => return None,
    };
    Some(value)
}

/// Generate a random single-precision float.
pub fn generate_float32<R: Rng>(rng: &mut R) -> Value {
    let bound = FLOAT_RANGE as f32;
    Value::Float32(rng.random_range(-bound..=bound))
}

/// Generate a random double-precision float.
pub fn generate_float64<R: Rng>(rng: &mut R) -> Value {
    Value::Float64(rng.random_range(-FLOAT_RANGE..=FLOAT_RANGE))
}

/// Generate a random decimal with 2 decimal places.
pub fn generate_decimal<R: Rng>(rng: &mut R) -> Value {
    let mantissa = rng.random_range(-DECIMAL_MANTISSA..=DECIMAL_MANTISSA);
    Value::Decimal(Decimal::new(mantissa, 2))
}
