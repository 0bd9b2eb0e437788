//! Timestamp value generators.
//!
//! Timestamps are anchored on the current time, so unlike the other
//! generators they are NOT deterministic for a fixed seed.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use rand::Rng;
use seedgraph_core::Value;

/// Maximum distance from now, in seconds (one year).
pub const WINDOW_SECS: i64 = 365 * 24 * 60 * 60;

/// Offsets are whole hours in `-12..=14`, the range of real-world zones.
const MIN_OFFSET_HOURS: i32 = -12;
const MAX_OFFSET_HOURS: i32 = 14;

/// Generate a UTC timestamp within [`WINDOW_SECS`] of `now`.
pub fn generate_date_time<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Value {
    Value::DateTime(shift(rng, now))
}

/// Generate an offset-aware timestamp within [`WINDOW_SECS`] of `now`,
/// expressed in a random whole-hour offset.
pub fn generate_date_time_offset<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Value {
    let instant = shift(rng, now);
    let hours = rng.random_range(MIN_OFFSET_HOURS..=MAX_OFFSET_HOURS);
    match FixedOffset::east_opt(hours * 3600) {
        Some(offset) => Value::DateTimeOffset(instant.with_timezone(&offset)),
        None => Value::DateTimeOffset(instant.fixed_offset()),
    }
}

fn shift<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = rng.random_range(-WINDOW_SECS..=WINDOW_SECS);
    now.checked_add_signed(TimeDelta::seconds(secs))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_date_time_within_window() {
        let mut rng = StdRng::seed_from_u64(42);
        let now = Utc::now();

        for _ in 0..50 {
            if let Value::DateTime(dt) = generate_date_time(&mut rng, now) {
                assert!((dt - now).num_seconds().abs() <= WINDOW_SECS);
            } else {
                panic!("Expected DateTime value");
            }
        }
    }

    #[test]
    fn test_date_time_offset_whole_hours() {
        let mut rng = StdRng::seed_from_u64(42);
        let now = Utc::now();

        for _ in 0..50 {
            if let Value::DateTimeOffset(dt) = generate_date_time_offset(&mut rng, now) {
                let secs = dt.offset().local_minus_utc();
                assert_eq!(secs % 3600, 0);
                assert!((MIN_OFFSET_HOURS * 3600..=MAX_OFFSET_HOURS * 3600).contains(&secs));
                assert!((dt.with_timezone(&Utc) - now).num_seconds().abs() <= WINDOW_SECS);
            } else {
                panic!("Expected DateTimeOffset value");
            }
        }
    }
}
