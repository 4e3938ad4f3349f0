//! # Fibonacci Backoff
//!
//! Progressive retry intervals for failing reconciliations.
//!
//! The sequence is `min, min, 2*min, 3*min, 5*min, ...` capped at `max`.
//! Each resource keeps its own instance so one failing DexServer never slows
//! down the retries of another.

/// Fibonacci backoff state for one resource
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// Create a backoff bounded by `min_secs` and `max_secs`
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            max_secs,
            previous: 0,
            current: 1,
        }
    }

    /// Return the next interval and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let value = self.current.saturating_mul(self.min_secs).min(self.max_secs);
        if value < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_follows_fibonacci() {
        let mut backoff = FibonacciBackoff::new(5, 1000);
        let values: Vec<u64> = (0..6).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(values, vec![5, 5, 10, 15, 25, 40]);
    }

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(5, 12);
        let values: Vec<u64> = (0..5).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(values, vec![5, 5, 10, 12, 12]);
    }
}
