//! Wall-clock aligned iteration boundaries.
//!
//! Iterations start every `minutes_per_iteration` minutes counted from the
//! top of the hour, so all clients fetch at the same instants.

use chrono::{DateTime, Duration, Timelike, Utc};

pub const MINUTES_PER_ITERATION: u32 = 5;

/// Milliseconds from `now` until the next iteration boundary. A reading that
/// falls exactly on a boundary waits for the following one.
pub fn ms_until_next_iteration<T: Timelike>(now: &T, minutes_per_iteration: u32) -> u64 {
    let interval_ms = u64::from(minutes_per_iteration.clamp(1, 60)) * 60_000;
    // leap seconds report nanoseconds past 1e9
    let millis = u64::from((now.nanosecond() / 1_000_000).min(999));
    let into_hour =
        u64::from(now.minute()) * 60_000 + u64::from(now.second()) * 1_000 + millis;
    interval_ms - into_hour % interval_ms
}

pub fn next_iteration_at(now: DateTime<Utc>, minutes_per_iteration: u32) -> DateTime<Utc> {
    let delay = ms_until_next_iteration(&now, minutes_per_iteration);
    now + Duration::milliseconds(delay as i64)
}
