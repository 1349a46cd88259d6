//! Reconnect delays for the account subscription.

use rand::Rng;
use std::time::Duration;

/// Exponent cap: delays stop growing after `2^MAX_BACKOFF_EXPONENT` base units.
pub const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Base unit of the reconnect delay.
pub const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Returns the delay before reconnect attempt `attempt` (0-based), without
/// jitter: `BACKOFF_BASE * 2^attempt`, capped.
pub fn reconnect_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT))
}

/// [`reconnect_delay`] plus up to 25% random jitter.
pub fn reconnect_delay_with_jitter(attempt: u32) -> Duration {
    let base = reconnect_delay(attempt);
    let max_jitter = base.as_millis() as u64 / 4;
    let jitter = rand::rng().random_range(0..=max_jitter);
    base + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay() {
        assert_eq!(reconnect_delay(0), Duration::from_millis(500));
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(3), Duration::from_secs(4));
        assert_eq!(reconnect_delay(6), Duration::from_secs(32));
        // Capped
        assert_eq!(reconnect_delay(7), Duration::from_secs(32));
        assert_eq!(reconnect_delay(100), Duration::from_secs(32));
    }

    #[test]
    fn test_jitter_bounds() {
        for attempt in 0..10 {
            let base = reconnect_delay(attempt);
            let delay = reconnect_delay_with_jitter(attempt);
            assert!(delay >= base);
            assert!(delay <= base + base / 4);
        }
    }
}
