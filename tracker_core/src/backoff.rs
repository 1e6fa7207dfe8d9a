//! Table-driven reconnect backoff with a retry cap.

use std::time::Duration;

use tracker_common::consts::{CLOUD_BACKOFF_DELAYS_S, CLOUD_CONNECT_RETRIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("reconnect attempts exhausted after {attempts} tries")]
pub struct BackoffExhausted {
    pub attempts: u32,
}

/// Attempt counter indexing [`CLOUD_BACKOFF_DELAYS_S`].
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    attempts: u32,
    max_retries: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(CLOUD_CONNECT_RETRIES)
    }
}

impl ReconnectBackoff {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempts: 0,
            max_retries,
        }
    }

    /// Delay for the next attempt. Fails once more than `max_retries`
    /// attempts have been made, until [`reset`](Self::reset).
    pub fn next_delay(&mut self) -> Result<Duration, BackoffExhausted> {
        if self.attempts > self.max_retries {
            return Err(BackoffExhausted {
                attempts: self.attempts,
            });
        }
        let index = (self.attempts as usize).min(CLOUD_BACKOFF_DELAYS_S.len() - 1);
        self.attempts += 1;
        Ok(Duration::from_secs(CLOUD_BACKOFF_DELAYS_S[index]))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_table_head() {
        let mut backoff = ReconnectBackoff::default();
        assert_eq!(backoff.next_delay().unwrap(), Duration::from_secs(32));
        assert_eq!(backoff.next_delay().unwrap(), Duration::from_secs(64));
    }

    #[test]
    fn delays_never_decrease_and_cap_at_last_entry() {
        let mut backoff = ReconnectBackoff::new(40);
        let mut last = Duration::ZERO;
        while let Ok(delay) = backoff.next_delay() {
            assert!(delay >= last);
            assert!(delay <= Duration::from_secs(1_048_576));
            last = delay;
        }
        assert_eq!(last, Duration::from_secs(1_048_576));
        assert_eq!(backoff.attempts(), 41);
    }

    #[test]
    fn exhausted_until_reset() {
        let mut backoff = ReconnectBackoff::new(2);
        for _ in 0..3 {
            backoff.next_delay().unwrap();
        }
        assert_eq!(backoff.next_delay(), Err(BackoffExhausted { attempts: 3 }));
        assert!(backoff.next_delay().is_err());
        backoff.reset();
        assert_eq!(backoff.next_delay().unwrap(), Duration::from_secs(32));
    }
}
