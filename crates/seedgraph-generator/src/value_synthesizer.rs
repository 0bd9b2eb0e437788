//! Default value creators per scalar type.

use chrono::Utc;
use rand::rngs::StdRng;
use seedgraph_core::ValueType;
use std::sync::Arc;

use crate::generators::{self, nullable::nullable, ValueCreator};

/// Maps a value type to a parameterless creator producing random values of
/// that type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueSynthesizer;

impl ValueSynthesizer {
    /// Create a new value synthesizer.
    pub fn new() -> Self {
        Self
    }

    /// Get a creator for the given type.
    ///
    /// Nullable fields get a creator that independently yields null on each
    /// call with probability [`generators::nullable::NULL_PROBABILITY`].
    /// Returns `None` if the type has no default generator, in which case a
    /// custom creator must be registered for the field.
    pub fn creator(&self, value_type: &ValueType, nullable_field: bool) -> Option<ValueCreator> {
        if !generators::is_supported(value_type) {
            return None;
        }

        let value_type = value_type.clone();
        let inner: ValueCreator = Arc::new(move |rng: &mut StdRng, hint: &str| {
            generators::generate_value(&value_type, rng, hint, Utc::now())
                .unwrap_or(seedgraph_core::Value::Null)
        });

        Some(if nullable_field { nullable(inner) } else { inner })
    }
}
