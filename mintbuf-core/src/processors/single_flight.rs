//! Single-flight guard for replenishment runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// At most one holder at a time, plus the largest deficit requested while
/// the slot was held.
///
/// The coalesced value is only a "something asked for more" marker: the
/// holder re-reads live state instead of replaying it.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
    coalesced: AtomicU64,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically take the slot. Returns `false` if it is already held.
    pub fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Record a request that arrived while the slot was held.
    pub fn coalesce(&self, deficit: u64) {
        self.coalesced.fetch_max(deficit, Ordering::AcqRel);
    }

    /// Take and clear the coalesced marker.
    pub fn take_coalesced(&self) -> Option<u64> {
        match self.coalesced.swap(0, Ordering::AcqRel) {
            0 => None,
            deficit => Some(deficit),
        }
    }

    pub fn has_coalesced(&self) -> bool {
        self.coalesced.load(Ordering::Acquire) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_only_one_holder() {
        let flight = SingleFlight::new();
        assert!(flight.try_acquire());
        assert!(!flight.try_acquire());
        assert!(flight.is_running());
        flight.release();
        assert!(!flight.is_running());
        assert!(flight.try_acquire());
    }

    #[test]
    fn test_coalesce_keeps_largest() {
        let flight = SingleFlight::new();
        assert_eq!(flight.take_coalesced(), None);
        flight.coalesce(3);
        flight.coalesce(8);
        flight.coalesce(5);
        assert!(flight.has_coalesced());
        assert_eq!(flight.take_coalesced(), Some(8));
        assert!(!flight.has_coalesced());
    }

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        let flight = Arc::new(SingleFlight::new());
        let winners: usize = (0..8)
            .map(|_| {
                let flight = flight.clone();
                std::thread::spawn(move || flight.try_acquire())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(winners, 1);
    }
}
