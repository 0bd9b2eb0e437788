//! UUID value generator.

use rand::Rng;
use seedgraph_core::Value;
use uuid::Uuid;

/// Generate a random UUID v4 using the provided RNG.
pub fn generate_uuid_v4<R: Rng>(rng: &mut R) -> Value {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    // Version 4, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Value::Uuid(Uuid::from_bytes(bytes))
}
