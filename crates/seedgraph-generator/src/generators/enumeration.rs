//! Enumeration value generator.

use rand::seq::IndexedRandom;
use rand::Rng;
use seedgraph_core::Value;

/// Pick a uniformly random member of an enumeration.
///
/// Returns `None` for an empty member list.
pub fn generate_enum_member<R: Rng>(rng: &mut R, values: &[String]) -> Option<Value> {
    values.choose(rng).map(|v| Value::Enum(v.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_member_is_declared() {
        let mut rng = StdRng::seed_from_u64(42);
        let values = vec!["draft".to_string(), "published".to_string()];

        for _ in 0..20 {
            match generate_enum_member(&mut rng, &values) {
                Some(Value::Enum(v)) => assert!(values.contains(&v)),
                other => panic!("Expected Enum value, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_enum() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(generate_enum_member(&mut rng, &[]).is_none());
    }
}
