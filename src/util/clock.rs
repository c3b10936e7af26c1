//! Wall-clock helpers shared across the engine.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Used for birth timestamps and audit-style bookkeeping where a wall-clock
/// value is more useful than a monotonic `Instant` (e.g. reporting a pool's
/// age to a caller).
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Seconds since the Unix epoch, truncated.
#[must_use]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }

    #[test]
    fn now_secs_matches_now_ms_order_of_magnitude() {
        let secs = now_secs();
        let ms = now_ms();
        assert!(u128::from(secs) * 1000 <= ms + 1000);
    }
}
