//! Text value generators.

use rand::distr::Alphanumeric;
use rand::Rng;
use seedgraph_core::Value;

/// Length of the random suffix appended to the hint.
pub const TEXT_SUFFIX_LEN: usize = 12;

/// Generate a string made of the hint followed by a random alphanumeric
/// suffix, e.g. `Name_x8Yq03LbRkTa`.
pub fn generate_text<R: Rng>(rng: &mut R, hint: &str) -> Value {
    let suffix: String = (0..TEXT_SUFFIX_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect();
    if hint.is_empty() {
        Value::Text(suffix)
    } else {
        Value::Text(format!("{hint}_{suffix}"))
    }
}
