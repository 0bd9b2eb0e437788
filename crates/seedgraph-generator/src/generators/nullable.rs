//! Nullable wrapper for value creators.

use rand::rngs::StdRng;
use rand::Rng;
use seedgraph_core::Value;
use std::sync::Arc;

use super::ValueCreator;

/// Probability that a nullable field is left null.
pub const NULL_PROBABILITY: f64 = 0.5;

/// Wrap a creator so that each call independently yields null with
/// [`NULL_PROBABILITY`], otherwise delegates to `inner`.
pub fn nullable(inner: ValueCreator) -> ValueCreator {
    Arc::new(move |rng: &mut StdRng, hint: &str| {
        if rng.random_bool(NULL_PROBABILITY) {
            Value::Null
        } else {
            inner(rng, hint)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_nullable_yields_both_outcomes() {
        let mut rng = StdRng::seed_from_u64(42);
        let creator = nullable(Arc::new(|_: &mut StdRng, _: &str| Value::Int32(7)));

        let values: Vec<Value> = (0..200).map(|_| creator(&mut rng, "")).collect();
        assert!(values.iter().any(Value::is_null));
        assert!(values.iter().any(|v| *v == Value::Int32(7)));
    }
}
